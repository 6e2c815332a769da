use crate::config::Config;
use crate::helper::snippet_helpers::{SnippetBuilder, SnippetError, TemplateFooter};
use crate::helper::{policy_helpers, resolver_helpers, sanitization_helpers};
use crate::models::content_store::{MediaAttribution, SiteStore};
use crate::models::Outcome;
use crate::{AppState, DbPool};
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse, HttpResponseBuilder};
use redb::Database;
use tera::{Context, Tera};

/// Mounts `GET /{endpoint}/{anything}`.
pub fn config_republish(cfg: &mut web::ServiceConfig, endpoint: &str) {
    cfg.service(
        web::scope(&format!("/{}", endpoint))
            .route("/{tail:.+}", web::get().to(republish_page)),
    );
}

fn render_page(tera: &Tera, template: &str, context: &Context, mut response: HttpResponseBuilder) -> HttpResponse {
    match tera.render(template, context) {
        Ok(html) => response.content_type("text/html; charset=utf-8").body(html),
        Err(e) => {
            log::error!("Failed to render template '{}': {}", template, e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

fn not_found_page(tera: &Tera) -> HttpResponse {
    let mut response = HttpResponse::NotFound();
    response
        .insert_header((header::CACHE_CONTROL, "no-cache, must-revalidate, max-age=0"))
        .insert_header((header::EXPIRES, "Wed, 11 Jan 1984 05:00:00 GMT"));
    render_page(tera, "404.html", &Context::new(), response)
}

fn error_page(tera: &Tera, message: &str) -> HttpResponse {
    let mut context = Context::new();
    context.insert("message", message);
    render_page(tera, "error.html", &context, HttpResponse::InternalServerError())
}

async fn republish_page(
    req: HttpRequest,
    tail: web::Path<String>,
    config: web::Data<Config>,
    tera: web::Data<Tera>,
    db: web::Data<Database>,
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
) -> HttpResponse {
    // A permalink may carry its own query string, e.g. `?p=<id>`.
    let path_suffix = match req.query_string() {
        "" => tail.into_inner(),
        query => format!("{}?{}", tail.into_inner(), query),
    };

    let policy = match pool.get() {
        Ok(conn) => policy_helpers::load_policy(&conn),
        Err(e) => {
            log::error!("Failed to get DB connection for republish policy: {}", e);
            return HttpResponse::InternalServerError().finish();
        }
    };

    let store = SiteStore::new(&db, &pool, &config.site_url);

    let post_id = match resolver_helpers::resolve(&path_suffix, &store, &policy) {
        Outcome::NotFound => return not_found_page(&tera),
        Outcome::RedirectToCanonical(url) => {
            return HttpResponse::Found()
                .insert_header((header::LOCATION, url))
                .finish();
        }
        Outcome::Render(post_id) => post_id,
    };

    let footer = TemplateFooter {
        template: &policy.footer_template,
        site_url: &config.site_url,
        timezone: &policy.timezone,
    };
    let attribution: Option<&dyn MediaAttribution> = if config.image_credits_enabled {
        Some(&store)
    } else {
        None
    };
    let builder = SnippetBuilder {
        policy: &policy,
        store: &store,
        attribution,
        footer: &footer,
        hooks: &state.hooks,
        site_url: &config.site_url,
    };

    let snippet = match builder.build(&post_id) {
        Ok(snippet) => snippet,
        Err(SnippetError::InvalidPostId(id)) => {
            log::warn!("Republish post {} disappeared before rendering", id);
            return error_page(&tera, "Invalid post ID.");
        }
        Err(e) => {
            log::error!("Failed to build republish snippet for post {}: {}", post_id, e);
            return HttpResponse::InternalServerError().finish();
        }
    };

    let mut context = Context::new();
    context.insert("canonical_url", &snippet.canonical_url);
    context.insert("post_title", &snippet.title);
    context.insert("snippet", &snippet.markup);
    context.insert("before_content", &snippet.before_content);
    context.insert("after_content", &snippet.after_content);
    context.insert(
        "license_statement",
        &sanitization_helpers::clean_license_statement(&policy.license_statement),
    );
    render_page(&tera, "republish.html", &context, HttpResponse::Ok())
}
