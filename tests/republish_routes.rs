use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use chrono::{TimeZone, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use redb::Database;
use republish_backend::config::{Config, WebConfig};
use republish_backend::models::db_operations::{posts_db_operations, site_db_operations};
use republish_backend::helper::snippet_helpers::SnippetHooks;
use republish_backend::models::{ContentItem, MediaAttachment, PostMetadata, OPT_OUT_META_KEY, SUBTITLE_META_KEY};
use republish_backend::setup::db_setup;
use republish_backend::{routes, AppState, DbPool};
use tempfile::TempDir;
use tera::Tera;

struct Fixture {
    _dir: TempDir,
    db: web::Data<Database>,
    pool: web::Data<DbPool>,
    config: Config,
}

impl Fixture {
    fn new(image_credits_enabled: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();

        let db = Database::create(dir.path().join("posts.db")).unwrap();
        db_setup::setup_posts_db(&db).unwrap();

        let pool = Pool::builder()
            .max_size(2)
            .build(SqliteConnectionManager::file(dir.path().join("site.db")))
            .unwrap();
        db_setup::setup_site_db(&mut pool.get().unwrap()).unwrap();

        let config = Config {
            web: WebConfig { host: "127.0.0.1".to_string(), port: 0 },
            database_path: dir.path().display().to_string(),
            media_path: dir.path().display().to_string(),
            site_url: "https://x.test".to_string(),
            republish_endpoint: "republish".to_string(),
            image_credits_enabled,
            allowed_origins: String::new(),
            log_level: "debug".to_string(),
        };

        Fixture {
            _dir: dir,
            db: web::Data::new(db),
            pool: web::Data::new(pool),
            config,
        }
    }

    fn post(&self, slug: &str, post_type: &str, content: &str, featured_media_id: Option<i64>) -> String {
        let metadata = PostMetadata {
            title: "Hello World".to_string(),
            slug: slug.to_string(),
            post_type: post_type.to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap(),
            author_byline: "By <a href=\"/author/jo\">Jo</a>".to_string(),
            featured_media_id,
        };
        posts_db_operations::create_post(&self.db, &metadata, content).unwrap()
    }

    fn meta(&self, post_id: &str, key: &str, value: &str) {
        let conn = self.pool.get().unwrap();
        site_db_operations::update_post_meta(&conn, post_id, key, value).unwrap();
    }

    fn setting(&self, key: &str, value: &str) {
        let conn = self.pool.get().unwrap();
        site_db_operations::update_setting(&conn, key, value).unwrap();
    }

    fn views(&self, post_id: &str) -> i64 {
        let conn = self.pool.get().unwrap();
        site_db_operations::read_view_count(&conn, post_id).unwrap()
    }

    fn media(&self, id: i64, can_distribute: Option<bool>) {
        let conn = self.pool.get().unwrap();
        site_db_operations::create_media(&conn, &MediaAttachment {
            id,
            file_path: format!("2024/01/{}.jpg", id),
            alt_text: String::new(),
            width: Some(1200),
            height: Some(800),
            can_distribute,
        })
        .unwrap();
    }
}

fn templates() -> Tera {
    Tera::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/**/*.html")).unwrap()
}

macro_rules! init_app {
    ($fixture:expr) => {
        init_app!($fixture, AppState::default())
    };
    ($fixture:expr, $state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($fixture.config.clone()))
                .app_data(web::Data::new(templates()))
                .app_data($fixture.db.clone())
                .app_data($fixture.pool.clone())
                .app_data(web::Data::new($state))
                .configure(routes::pixel::config_pixel)
                .configure(routes::public::config_api)
                .configure(|cfg| routes::republish::config_republish(cfg, "republish")),
        )
        .await
    };
}

macro_rules! get {
    ($app:expr, $uri:expr) => {{
        let resp = test::call_service(&$app, test::TestRequest::get().uri($uri).to_request()).await;
        let status = resp.status();
        let location = resp
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
        (status, location, body)
    }};
}

#[actix_web::test]
async fn eligible_post_renders_escaped_snippet_with_seo_head() {
    let fixture = Fixture::new(false);
    let id = fixture.post("hello-world", "post", "<p>Body text</p>", None);
    fixture.meta(&id, SUBTITLE_META_KEY, "A subtitle");
    let app = init_app!(fixture);

    let (status, _, body) = get!(app, "/republish/hello-world/");

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<meta name=\"robots\" content=\"noindex, nofollow\" />"));
    assert!(body.contains("<link rel=\"canonical\" href=\"https:&#x2F;&#x2F;x.test&#x2F;hello-world&#x2F;\" />"));
    assert!(body.contains("<textarea rows=\"19\" readonly"));
    assert!(body.contains("&lt;h1&gt;Hello World&lt;&#x2F;h1&gt;"));
    assert!(body.contains("&lt;h2&gt;A subtitle&lt;&#x2F;h2&gt;"));
    assert!(body.contains("&lt;time&gt;Jan 15 12:00pm UTC&lt;&#x2F;time&gt;"));
    assert!(body.contains("&lt;p&gt;Body text&lt;&#x2F;p&gt;"));
    assert!(!body.contains("republish-article__license"));
}

#[actix_web::test]
async fn full_permalink_and_id_query_resolve_too() {
    let fixture = Fixture::new(false);
    let id = fixture.post("hello-world", "post", "<p>Body</p>", None);
    let app = init_app!(fixture);

    let (status, _, _) = get!(app, "/republish/https://x.test/2024/01/hello-world/");
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = get!(app, &format!("/republish/index.php?p={}", id));
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = get!(app, "/republish/https://elsewhere.test/hello-world/");
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn unknown_path_is_a_no_cache_404() {
    let fixture = Fixture::new(false);
    let app = init_app!(fixture);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/republish/nope/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        resp.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-cache, must-revalidate, max-age=0"
    );
    let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert!(body.contains("Page not found"));
}

#[actix_web::test]
async fn opted_out_post_redirects_to_canonical() {
    let fixture = Fixture::new(false);
    let id = fixture.post("hidden", "post", "<p>x</p>", None);
    fixture.meta(&id, OPT_OUT_META_KEY, "1");
    let app = init_app!(fixture);

    let (status, location, _) = get!(app, "/republish/hidden/");
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(location.as_deref(), Some("https://x.test/hidden/"));
}

#[actix_web::test]
async fn ineligible_type_redirects_until_enabled() {
    let fixture = Fixture::new(false);
    fixture.post("about", "page", "<p>x</p>", None);
    let app = init_app!(fixture);

    let (status, location, _) = get!(app, "/republish/about/");
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(location.as_deref(), Some("https://x.test/about/"));

    fixture.setting("republish_post_types", "post,page");
    let (status, _, _) = get!(app, "/republish/about/");
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn image_credits_redact_only_when_installed() {
    let body = "<p>Intro</p><figure><img class=\"wp-image-7\" src=\"https://x.test/media/inline-7.jpg\"><figcaption>c</figcaption></figure>";

    let with_credits = Fixture::new(true);
    with_credits.media(7, None);
    with_credits.media(8, Some(false));
    with_credits.post("pics", "post", body, Some(8));
    let app = init_app!(with_credits);
    let (status, _, page) = get!(app, "/republish/pics/");
    assert_eq!(status, StatusCode::OK);
    assert!(!page.contains("inline-7.jpg"));
    assert!(!page.contains("8.jpg"));
    assert!(page.contains("Intro"));

    let without_credits = Fixture::new(false);
    without_credits.media(7, None);
    without_credits.media(8, Some(false));
    without_credits.post("pics", "post", body, Some(8));
    let app = init_app!(without_credits);
    let (_, _, page) = get!(app, "/republish/pics/");
    assert!(page.contains("inline-7.jpg"));
    assert!(page.contains("2024&#x2F;01&#x2F;8.jpg"));
}

#[actix_web::test]
async fn license_statement_is_sanitized_and_shown() {
    let fixture = Fixture::new(false);
    fixture.post("hello-world", "post", "<p>Body</p>", None);
    fixture.setting(
        "license_statement",
        "<p>Licensed <a href=\"https://creativecommons.org/licenses/by-nd/4.0/\">CC BY-ND</a></p><script>steal()</script>",
    );
    let app = init_app!(fixture);

    let (_, _, page) = get!(app, "/republish/hello-world/");
    assert!(page.contains("republish-article__license"));
    assert!(page.contains(">CC BY-ND</a></p>"));
    assert!(!page.contains("steal()"));
}

#[actix_web::test]
async fn footer_template_is_appended_after_canonical_link() {
    let fixture = Fixture::new(false);
    fixture.post("hello-world", "post", "<p>Body</p>", None);
    fixture.setting("footer_template", "<p>First published by Example News.</p>");
    let app = init_app!(fixture);

    let (_, _, page) = get!(app, "/republish/hello-world/");
    let canonical = page.find("&lt;link rel=&quot;canonical&quot;").unwrap();
    let footer = page.find("First published by Example News.").unwrap();
    assert!(canonical < footer);
}

#[actix_web::test]
async fn health_probe_answers() {
    let fixture = Fixture::new(false);
    let app = init_app!(fixture);

    let (status, _, body) = get!(app, "/api/is_server_active");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "active");
}

#[actix_web::test]
async fn view_hooks_wrap_the_snippet_box() {
    let fixture = Fixture::new(false);
    fixture.post("hello-world", "post", "<p>Body</p>", None);
    let state = AppState {
        hooks: SnippetHooks {
            before_content: Some(Box::new(|item: &ContentItem| format!("<aside class=\"before\">{}</aside>", item.title))),
            after_content: Some(Box::new(|_: &ContentItem| "<aside class=\"after\">Thanks</aside>".to_string())),
            ..SnippetHooks::default()
        },
    };
    let app = init_app!(fixture, state);

    let (status, _, page) = get!(app, "/republish/hello-world/");
    assert_eq!(status, StatusCode::OK);
    let before = page.find("<aside class=\"before\">Hello World</aside>").unwrap();
    let content = page.find("republish-article__content").unwrap();
    let after = page.find("<aside class=\"after\">Thanks</aside>").unwrap();
    assert!(before < content && content < after);
}

#[actix_web::test]
async fn snippet_carries_pixel_once_tracking_is_configured() {
    let fixture = Fixture::new(false);
    let id = fixture.post("hello-world", "post", "<p>Body</p>", None);
    fixture.setting("ga_tracking_id", "UA-1");
    let app = init_app!(fixture);

    let (_, _, page) = get!(app, "/republish/hello-world/");
    let pixel_src = format!("?republication-pixel=true&amp;amp;post={}&amp;amp;ga=UA-1", id);
    assert!(page.contains(&pixel_src), "pixel missing from {}", page);
}

#[actix_web::test]
async fn pixel_hits_are_counted_per_known_post() {
    let fixture = Fixture::new(false);
    let id = fixture.post("hello-world", "post", "<p>Body</p>", None);
    let app = init_app!(fixture);
    let uri = format!("/?republication-pixel=true&post={}&ga=UA-1", id);

    for _ in 0..2 {
        let req = test::TestRequest::get()
            .uri(&uri)
            .insert_header((header::REFERER, "https://partner.test/story"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get(header::CONTENT_TYPE).unwrap(), "image/gif");
        let body = test::read_body(resp).await;
        assert!(body.starts_with(b"GIF89a"));
        assert_eq!(body.len(), 43);
    }
    assert_eq!(fixture.views(&id), 2);

    let (status, _, _) = get!(app, "/?republication-pixel=true&post=not-a-post&ga=UA-1");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fixture.views("not-a-post"), 0);
}

#[actix_web::test]
async fn incomplete_pixel_query_is_not_a_pixel() {
    let fixture = Fixture::new(false);
    let id = fixture.post("hello-world", "post", "<p>Body</p>", None);
    let app = init_app!(fixture);

    let (status, _, _) = get!(app, &format!("/?republication-pixel=true&post={}", id));
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(fixture.views(&id), 0);
}
