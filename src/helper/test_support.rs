use std::collections::{HashMap, HashSet};
use chrono::{TimeZone, Utc};
use crate::helper::sanitization_helpers;
use crate::models::content_store::{ContentStore, MediaAttribution};
use crate::models::db_operations::posts_db_operations::DbError;
use crate::models::{ContentItem, RepublishPolicy};

/// In-memory store keyed by post id; a path suffix resolves when it equals an id.
#[derive(Default)]
pub struct MemoryStore {
    pub items: HashMap<String, ContentItem>,
    pub fail_lookups: bool,
}

impl MemoryStore {
    pub fn with(items: Vec<ContentItem>) -> Self {
        Self {
            items: items.into_iter().map(|i| (i.id.clone(), i)).collect(),
            fail_lookups: false,
        }
    }
}

impl ContentStore for MemoryStore {
    fn url_to_post_id(&self, url: &str) -> Result<Option<String>, DbError> {
        if self.fail_lookups {
            return Err(DbError::NotFound("lookup service unavailable".to_string()));
        }
        Ok(self.items.contains_key(url).then(|| url.to_string()))
    }

    fn load_item(&self, id: &str) -> Result<Option<ContentItem>, DbError> {
        Ok(self.items.get(id).cloned())
    }
}

pub struct Distributable(pub HashSet<i64>);

impl MediaAttribution for Distributable {
    fn can_distribute(&self, media_id: i64) -> bool {
        self.0.contains(&media_id)
    }
}

pub fn item(id: &str) -> ContentItem {
    ContentItem {
        id: id.to_string(),
        title: "Hello".to_string(),
        subtitle: None,
        body: "<p>World</p>".to_string(),
        published_at: Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap(),
        byline: String::new(),
        featured_image: None,
        canonical_url: format!("https://x.test/{}", id),
        opt_out: false,
        content_type: "post".to_string(),
    }
}

pub fn policy() -> RepublishPolicy {
    RepublishPolicy {
        license_statement: String::new(),
        allowed_tags: sanitization_helpers::default_allowed_tags(),
        post_types: vec!["post".to_string()],
        footer_template: String::new(),
        timezone: "UTC".to_string(),
        shortcode_tags: Vec::new(),
        tracking_id: String::new(),
    }
}
