use actix_cors::Cors;
use actix_web::{web, App, HttpServer, middleware::{Logger, DefaultHeaders}, HttpResponse, Responder};
use tera::Tera;
use republish_backend::{config::Config, routes, AppState};
use redb::Database;
use r2d2_sqlite::SqliteConnectionManager;
use r2d2::Pool;
use std::fs;
use clap::Parser;
use std::path::PathBuf;

/// A simple handler for the root URL.
async fn root_handler() -> impl Responder {
    HttpResponse::Ok().content_type("text/plain").body("OK")
}

#[derive(Parser, Debug)]
#[command(name = "republish_server", author, version, about = "Starts the republish web server.")]
struct Cli {
    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file)
        .expect("FATAL: Failed to load or parse configuration.");

    env_logger::init_from_env(env_logger::Env::new().default_filter_or(&config.log_level));

    let tera = Tera::new("templates/**/*.html").expect("Tera initialization failed");

    fs::create_dir_all(&config.database_path)
        .expect("Failed to create database directory");

    let redb_db_data = web::Data::new(Database::open(config.posts_db_path())
        .expect("FATAL: posts.db not found. Run 'cargo run --bin setup_cli -- --env-file <path> db setup'"));

    let manager = SqliteConnectionManager::file(config.site_db_path());
    let pool = Pool::builder()
        .build(manager)
        .expect("FATAL: Failed to create Rusqlite connection pool.");

    // Hooks are fixed for the lifetime of the process; sites extend the pipeline here.
    let app_state = web::Data::new(AppState::default());

    let server_address = format!("{}:{}", config.web.host, config.web.port);
    log::info!(
        "Server starting at http://{} (republish endpoint: /{}/, image credits: {})",
        server_address,
        config.republish_endpoint,
        if config.image_credits_enabled { "on" } else { "off" }
    );

    HttpServer::new(move || {
        let cors = {
            let allowed_origins_str = &config.allowed_origins;
            if allowed_origins_str.trim() == "*" {
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET"])
                    .max_age(3600)
            } else {
                let mut cors = Cors::default();
                let origins: Vec<&str> = allowed_origins_str.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()).collect();
                for origin in origins {
                    cors = cors.allowed_origin(origin);
                }
                cors.allowed_methods(vec!["GET"]).max_age(3600)
            }
        };

        let endpoint = config.republish_endpoint.clone();

        App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY"))
            )
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(tera.clone()))
            .app_data(redb_db_data.clone())
            .app_data(web::Data::new(pool.clone()))
            .app_data(app_state.clone())

            .configure(routes::pixel::config_pixel)
            .configure(routes::public::config_api)
            .configure(|cfg| routes::republish::config_republish(cfg, &endpoint))
            .service(actix_files::Files::new("/media", &config.media_path))
            .service(actix_files::Files::new("/ssr_static", "./ssr_static"))

            .route("/", web::get().to(root_handler))
    })
    .bind(server_address)?
    .run()
    .await
}
