use clap::{Parser, Subcommand};
use republish_backend::config::Config;
use republish_backend::models::db_operations::{posts_db_operations, site_db_operations};
use republish_backend::models::{MediaAttachment, PostMetadata, OPT_OUT_META_KEY, SUBTITLE_META_KEY};
use republish_backend::setup::db_setup;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use redb::Database;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "setup_cli", author, version, about = "A CLI for setting up and seeding the republish backend.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    Post {
        #[command(subcommand)]
        action: PostAction,
    },
    Media {
        #[command(subcommand)]
        action: MediaAction,
    },
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    Stats {
        #[command(subcommand)]
        action: StatsAction,
    },
}

#[derive(Subcommand, Debug)]
enum DbAction {
    Setup {
        db_type: Option<String>,
    }
}

#[derive(Subcommand, Debug)]
enum PostAction {
    /// Imports a post from a JSON file.
    Import {
        #[arg(long)]
        file: PathBuf,
    },
    /// Hides the republish page of a post.
    OptOut {
        #[arg(long)]
        slug: String,
    },
    /// Makes a post republishable again.
    OptIn {
        #[arg(long)]
        slug: String,
    },
}

#[derive(Subcommand, Debug)]
enum MediaAction {
    Add {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        file_path: String,
        #[arg(long, default_value = "")]
        alt: String,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        /// Leave unset when the image credit has not been filled in.
        #[arg(long)]
        can_distribute: Option<bool>,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    Set {
        #[arg(long)]
        key: String,
        #[arg(long)]
        value: String,
    },
    List,
}

#[derive(Subcommand, Debug)]
enum StatsAction {
    /// Shows how often the republished copy of a post was viewed, per referring page.
    Views {
        #[arg(long)]
        slug: String,
    },
}

fn default_post_type() -> String {
    "post".to_string()
}

#[derive(Deserialize)]
struct PostImport {
    title: String,
    slug: String,
    content: String,
    #[serde(default = "default_post_type")]
    post_type: String,
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    author_byline: String,
    subtitle: Option<String>,
    featured_media_id: Option<i64>,
    #[serde(default)]
    opt_out: bool,
}

fn main() {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file)
        .expect("FATAL: Failed to load or parse configuration.");

    env_logger::init_from_env(env_logger::Env::new().default_filter_or(&config.log_level));

    match &cli.command {
        Commands::Db { action } => match action {
            DbAction::Setup { db_type } => {
                match db_type.as_deref() {
                    Some("site") => setup_site_database(&config),
                    Some("posts") => setup_posts_database(&config),
                    Some(other) => eprintln!("❌ Error: Unknown database type '{}'. Use 'site' or 'posts'.", other),
                    None => {
                        setup_site_database(&config);
                        setup_posts_database(&config);
                    }
                }
            }
        },
        Commands::Post { action } => match action {
            PostAction::Import { file } => import_post(&config, file),
            PostAction::OptOut { slug } => set_opt_out(&config, slug, true),
            PostAction::OptIn { slug } => set_opt_out(&config, slug, false),
        },
        Commands::Media { action } => match action {
            MediaAction::Add { id, file_path, alt, width, height, can_distribute } => {
                let media = MediaAttachment {
                    id: *id,
                    file_path: file_path.clone(),
                    alt_text: alt.clone(),
                    width: *width,
                    height: *height,
                    can_distribute: *can_distribute,
                };
                add_media(&config, &media);
            }
        },
        Commands::Settings { action } => match action {
            SettingsAction::Set { key, value } => set_setting(&config, key, value),
            SettingsAction::List => list_settings(&config),
        },
        Commands::Stats { action } => match action {
            StatsAction::Views { slug } => show_views(&config, slug),
        },
    }
}

fn setup_site_database(config: &Config) {
    let db_path = config.site_db_path();
    if db_path.exists() {
        println!("ℹ️ Site database already exists at '{}'. Skipping creation.", db_path.display());
        return;
    }
    println!("\nSetting up site database at '{}'...", db_path.display());

    if let Some(parent_dir) = db_path.parent() {
        fs::create_dir_all(parent_dir).expect("Could not create database directory.");
    }

    let mut conn = Connection::open(&db_path).expect("Could not create site database file.");
    match db_setup::setup_site_db(&mut conn) {
        Ok(_) => println!("✅ Site database setup completed successfully."),
        Err(e) => eprintln!("❌ Error setting up site database: {}", e),
    }
}

fn setup_posts_database(config: &Config) {
    let db_path = config.posts_db_path();
    if db_path.exists() {
        println!("ℹ️ Posts database already exists at '{}'. Skipping creation.", db_path.display());
        return;
    }
    println!("\nSetting up posts database at '{}'...", db_path.display());

    if let Some(parent_dir) = db_path.parent() {
        fs::create_dir_all(parent_dir).expect("Could not create database directory.");
    }

    let db = Database::create(&db_path).expect("Failed to create posts database file.");
    match db_setup::setup_posts_db(&db) {
        Ok(_) => println!("✅ Posts database setup completed successfully."),
        Err(e) => eprintln!("❌ Error setting up posts database: {}", e),
    }
}

fn open_site_db(config: &Config) -> Option<Connection> {
    let db_path = config.site_db_path();
    if !db_path.exists() {
        eprintln!("❌ Error: Site database not found at '{}'. Please run `setup_cli db setup` first.", db_path.display());
        return None;
    }
    match Connection::open(&db_path) {
        Ok(conn) => Some(conn),
        Err(e) => {
            eprintln!("❌ Error opening site database: {}", e);
            None
        }
    }
}

fn open_posts_db(config: &Config) -> Option<Database> {
    match Database::open(config.posts_db_path()) {
        Ok(db) => Some(db),
        Err(e) => {
            eprintln!("❌ Error: Could not open posts database ({}). Please run `setup_cli db setup` first.", e);
            None
        }
    }
}

fn import_post(config: &Config, file: &PathBuf) {
    let raw = match fs::read_to_string(file) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("❌ Error reading '{}': {}", file.display(), e);
            return;
        }
    };
    let import: PostImport = match serde_json::from_str(&raw) {
        Ok(import) => import,
        Err(e) => {
            eprintln!("❌ Error parsing '{}': {}", file.display(), e);
            return;
        }
    };

    let (Some(db), Some(conn)) = (open_posts_db(config), open_site_db(config)) else {
        return;
    };

    let metadata = PostMetadata {
        title: import.title,
        slug: import.slug,
        post_type: import.post_type,
        created_at: import.created_at.unwrap_or_else(Utc::now),
        author_byline: import.author_byline,
        featured_media_id: import.featured_media_id,
    };

    let post_id = match posts_db_operations::create_post(&db, &metadata, &import.content) {
        Ok(id) => id,
        Err(e) => {
            eprintln!("❌ Error importing post: {}", e);
            return;
        }
    };

    let mut meta: Vec<(&str, String)> = Vec::new();
    if let Some(subtitle) = import.subtitle.filter(|s| !s.trim().is_empty()) {
        meta.push((SUBTITLE_META_KEY, subtitle));
    }
    if import.opt_out {
        meta.push((OPT_OUT_META_KEY, "1".to_string()));
    }
    for (key, value) in meta {
        if let Err(e) = site_db_operations::update_post_meta(&conn, &post_id, key, &value) {
            eprintln!("❌ Error saving '{}' for post {}: {}", key, post_id, e);
            return;
        }
    }

    println!("✅ Imported post '{}' with id {}.", metadata.slug, post_id);
}

fn set_opt_out(config: &Config, slug: &str, opt_out: bool) {
    let (Some(db), Some(conn)) = (open_posts_db(config), open_site_db(config)) else {
        return;
    };

    let post_id = match posts_db_operations::find_post_id_by_slug(&db, slug) {
        Ok(Some(id)) => id,
        Ok(None) => {
            eprintln!("❌ Error: No post with slug '{}' found.", slug);
            return;
        }
        Err(e) => {
            eprintln!("❌ Error looking up slug '{}': {}", slug, e);
            return;
        }
    };

    let result = if opt_out {
        site_db_operations::update_post_meta(&conn, &post_id, OPT_OUT_META_KEY, "1")
    } else {
        site_db_operations::delete_post_meta(&conn, &post_id, OPT_OUT_META_KEY).map(|_| ())
    };

    match result {
        Ok(_) if opt_out => println!("✅ Post '{}' no longer offers a republish page.", slug),
        Ok(_) => println!("✅ Post '{}' can be republished again.", slug),
        Err(e) => eprintln!("❌ Error updating post '{}': {}", slug, e),
    }
}

fn add_media(config: &Config, media: &MediaAttachment) {
    let Some(conn) = open_site_db(config) else {
        return;
    };
    match site_db_operations::create_media(&conn, media) {
        Ok(_) => println!("✅ Media {} registered.", media.id),
        Err(e) => eprintln!("❌ Error registering media {}: {}", media.id, e),
    }
}

fn set_setting(config: &Config, key: &str, value: &str) {
    let Some(conn) = open_site_db(config) else {
        return;
    };
    match site_db_operations::update_setting(&conn, key, value) {
        Ok(_) => println!("✅ Setting '{}' updated.", key),
        Err(e) => eprintln!("❌ Error updating setting '{}': {}", key, e),
    }
}

fn list_settings(config: &Config) {
    let Some(conn) = open_site_db(config) else {
        return;
    };
    match site_db_operations::read_all_settings(&conn) {
        Ok(settings) => {
            println!("Site settings:");
            for (key, value) in settings {
                println!("- {} = {}", key, value);
            }
        }
        Err(e) => eprintln!("❌ Error reading settings: {}", e),
    }
}

fn show_views(config: &Config, slug: &str) {
    let (Some(db), Some(conn)) = (open_posts_db(config), open_site_db(config)) else {
        return;
    };

    let post_id = match posts_db_operations::find_post_id_by_slug(&db, slug) {
        Ok(Some(id)) => id,
        Ok(None) => {
            eprintln!("❌ Error: No post with slug '{}' found.", slug);
            return;
        }
        Err(e) => {
            eprintln!("❌ Error looking up slug '{}': {}", slug, e);
            return;
        }
    };

    match site_db_operations::read_views_by_referrer(&conn, &post_id) {
        Ok(views) if views.is_empty() => println!("ℹ️ No republished views recorded for '{}'.", slug),
        Ok(views) => {
            let total: i64 = views.iter().map(|(_, count)| count).sum();
            println!("Republished views for '{}': {}", slug, total);
            for (referrer, count) in views {
                let referrer = if referrer.is_empty() { "(no referrer)" } else { referrer.as_str() };
                println!("- {} {}", count, referrer);
            }
        }
        Err(e) => eprintln!("❌ Error reading views for '{}': {}", slug, e),
    }
}
