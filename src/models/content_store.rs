use redb::Database;
use rusqlite::Connection;
use url::Url;
use uuid::Uuid;
use crate::models::db_operations::posts_db_operations::{self, DbError};
use crate::models::db_operations::site_db_operations;
use crate::models::{ContentItem, FeaturedImage, FullPost, MediaAttachment, OPT_OUT_META_KEY, SUBTITLE_META_KEY};
use crate::DbPool;

/// Lookup side of the content store: URL resolution and item loading.
pub trait ContentStore {
    /// Maps a permalink, path or `?p=<id>` query to a post id. `Ok(None)` when nothing matches.
    fn url_to_post_id(&self, url: &str) -> Result<Option<String>, DbError>;

    fn load_item(&self, id: &str) -> Result<Option<ContentItem>, DbError>;
}

/// Per-asset redistribution flags, supplied by the image credits subsystem.
pub trait MediaAttribution {
    /// An unknown asset or an unset flag both mean "may not be redistributed".
    fn can_distribute(&self, media_id: i64) -> bool;
}

/// PHP-style truthiness for meta values: empty, "0" and "false" are unset.
pub fn meta_flag_is_set(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && value != "0" && !value.eq_ignore_ascii_case("false")
}

pub fn permalink(site_url: &str, slug: &str) -> String {
    format!("{}/{}/", site_url.trim_end_matches('/'), slug)
}

/// Full-size `<img>` markup for a featured image, the way themes print post thumbnails.
pub fn featured_image_markup(media: &MediaAttachment, site_url: &str) -> String {
    let mut markup = String::from("<img");
    if let Some(width) = media.width {
        markup.push_str(&format!(" width=\"{}\"", width));
    }
    if let Some(height) = media.height {
        markup.push_str(&format!(" height=\"{}\"", height));
    }
    let src = format!("{}/media/{}", site_url.trim_end_matches('/'), media.file_path.trim_start_matches('/'));
    markup.push_str(&format!(
        " src=\"{}\" class=\"attachment-full size-full wp-post-image\" alt=\"{}\" />",
        html_escape::encode_double_quoted_attribute(&src),
        html_escape::encode_double_quoted_attribute(&media.alt_text),
    ));
    markup
}

/// The site's own content store: posts in redb, options and meta in SQLite.
pub struct SiteStore<'a> {
    posts: &'a Database,
    pool: &'a DbPool,
    site_url: &'a str,
}

impl<'a> SiteStore<'a> {
    pub fn new(posts: &'a Database, pool: &'a DbPool, site_url: &'a str) -> Self {
        Self { posts, pool, site_url }
    }

    fn post_exists(&self, id: &str) -> Result<bool, DbError> {
        Ok(posts_db_operations::read_post(self.posts, id)?.is_some())
    }

    fn is_own_host(&self, url: &Url) -> bool {
        match Url::parse(self.site_url) {
            Ok(site) => site.host_str() == url.host_str(),
            Err(_) => false,
        }
    }

    fn build_item(&self, conn: &Connection, post: FullPost) -> Result<ContentItem, DbError> {
        let subtitle = site_db_operations::read_post_meta(conn, &post.id, SUBTITLE_META_KEY)?
            .filter(|s| !s.trim().is_empty());
        let opt_out = site_db_operations::read_post_meta(conn, &post.id, OPT_OUT_META_KEY)?
            .map(|v| meta_flag_is_set(&v))
            .unwrap_or(false);

        let featured_image = match post.metadata.featured_media_id {
            Some(media_id) => site_db_operations::read_media(conn, media_id)?.map(|media| FeaturedImage {
                media_id,
                markup: featured_image_markup(&media, self.site_url),
            }),
            None => None,
        };

        Ok(ContentItem {
            canonical_url: permalink(self.site_url, &post.metadata.slug),
            id: post.id,
            title: post.metadata.title,
            subtitle,
            body: post.content,
            published_at: post.metadata.created_at,
            byline: post.metadata.author_byline,
            featured_image,
            opt_out,
            content_type: post.metadata.post_type,
        })
    }
}

impl ContentStore for SiteStore<'_> {
    fn url_to_post_id(&self, url: &str) -> Result<Option<String>, DbError> {
        let target = url.trim();
        if target.is_empty() {
            return Ok(None);
        }

        let (path, query) = match Url::parse(target) {
            Ok(parsed) => {
                if !self.is_own_host(&parsed) {
                    return Ok(None);
                }
                (parsed.path().to_string(), parsed.query().map(str::to_string))
            }
            Err(_) => match target.split_once('?') {
                Some((path, query)) => (path.to_string(), Some(query.to_string())),
                None => (target.to_string(), None),
            },
        };

        if let Some(query) = query {
            let post_param = url::form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == "p")
                .map(|(_, value)| value.into_owned());
            if let Some(id) = post_param {
                return Ok(self.post_exists(&id)?.then_some(id));
            }
        }

        let last_segment = match path.split('/').filter(|s| !s.is_empty()).last() {
            Some(segment) => segment,
            None => return Ok(None),
        };

        if Uuid::parse_str(last_segment).is_ok() && self.post_exists(last_segment)? {
            return Ok(Some(last_segment.to_string()));
        }

        posts_db_operations::find_post_id_by_slug(self.posts, last_segment)
    }

    fn load_item(&self, id: &str) -> Result<Option<ContentItem>, DbError> {
        let post = match posts_db_operations::read_post(self.posts, id)? {
            Some(post) => post,
            None => return Ok(None),
        };
        let conn = self.pool.get()?;
        self.build_item(&conn, post).map(Some)
    }
}

impl MediaAttribution for SiteStore<'_> {
    fn can_distribute(&self, media_id: i64) -> bool {
        let lookup = self
            .pool
            .get()
            .map_err(DbError::from)
            .and_then(|conn| site_db_operations::read_media(&conn, media_id).map_err(DbError::from));

        match lookup {
            Ok(Some(media)) => media.can_distribute.unwrap_or(false),
            Ok(None) => false,
            Err(e) => {
                log::warn!("Could not read distribution flag for media {}: {}", media_id, e);
                false
            }
        }
    }
}
