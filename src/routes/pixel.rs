use crate::models::db_operations::{posts_db_operations, site_db_operations};
use crate::DbPool;
use actix_web::guard::{self, GuardContext};
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use redb::Database;
use serde::Deserialize;
use std::collections::HashSet;

/// Query keys that turn a request for the site root into a pixel hit.
const PIXEL_QUERY_KEYS: [&str; 3] = ["republication-pixel", "post", "ga"];

/// 1x1 transparent GIF.
const TRANSPARENT_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

#[derive(Deserialize)]
pub struct PixelQuery {
    post: String,
    ga: String,
}

/// Mounts the tracking pixel on `GET /?republication-pixel=...&post=...&ga=...`.
/// Must be configured before any other `/` route so the guard gets the first look.
pub fn config_pixel(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/")
            .guard(guard::fn_guard(is_pixel_request))
            .route(web::get().to(tracking_pixel)),
    );
}

fn is_pixel_request(ctx: &GuardContext) -> bool {
    let query = ctx.head().uri.query().unwrap_or("");
    let keys: HashSet<String> = url::form_urlencoded::parse(query.as_bytes())
        .map(|(key, _)| key.into_owned())
        .collect();
    PIXEL_QUERY_KEYS.iter().all(|key| keys.contains(*key))
}

async fn tracking_pixel(
    req: HttpRequest,
    query: web::Query<PixelQuery>,
    db: web::Data<Database>,
    pool: web::Data<DbPool>,
) -> HttpResponse {
    let referrer = req
        .headers()
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    match posts_db_operations::read_post(&db, &query.post) {
        Ok(Some(_)) => match pool.get() {
            Ok(conn) => {
                if let Err(e) = site_db_operations::record_view(&conn, &query.post, referrer) {
                    log::error!("Failed to record view for post {}: {}", query.post, e);
                } else {
                    log::debug!("Recorded view for post {} (tracking id '{}')", query.post, query.ga);
                }
            }
            Err(e) => log::error!("Failed to get DB connection for pixel hit: {}", e),
        },
        Ok(None) => log::debug!("Ignoring pixel hit for unknown post '{}'", query.post),
        Err(e) => log::error!("Failed to look up post {} for pixel hit: {}", query.post, e),
    }

    HttpResponse::Ok()
        .content_type("image/gif")
        .insert_header((header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"))
        .body(TRANSPARENT_GIF)
}
