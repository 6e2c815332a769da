use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Post meta key carrying the per-item republish opt-out flag.
pub const OPT_OUT_META_KEY: &str = "republish_hide_widget";
/// Post meta key carrying the optional subtitle.
pub const SUBTITLE_META_KEY: &str = "post_subtitle";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PostMetadata {
    pub title: String,
    pub slug: String,
    pub post_type: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub author_byline: String,
    pub featured_media_id: Option<i64>,
}

#[derive(Serialize)]
pub struct FullPost {
    pub id: String,
    pub metadata: PostMetadata,
    pub content: String,
}

/// The featured image of an item, as rendered for republication.
#[derive(Debug, Clone, PartialEq)]
pub struct FeaturedImage {
    pub media_id: i64,
    pub markup: String,
}

/// A publishable article, read-only to the republish pipeline.
#[derive(Debug, Clone)]
pub struct ContentItem {
    pub id: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub body: String,
    pub published_at: DateTime<Utc>,
    pub byline: String,
    pub featured_image: Option<FeaturedImage>,
    pub canonical_url: String,
    pub opt_out: bool,
    pub content_type: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MediaAttachment {
    pub id: i64,
    pub file_path: String,
    pub alt_text: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub can_distribute: Option<bool>,
}

/// Site-wide configuration governing sanitization and eligibility.
#[derive(Debug, Clone)]
pub struct RepublishPolicy {
    pub license_statement: String,
    pub allowed_tags: Vec<String>,
    pub post_types: Vec<String>,
    pub footer_template: String,
    pub timezone: String,
    pub shortcode_tags: Vec<String>,
    /// Analytics property id passed along by the tracking pixel; empty disables the pixel.
    pub tracking_id: String,
}

/// The finished republication markup for one item, plus what the view needs around it.
#[derive(Debug, Clone)]
pub struct RenderedSnippet {
    pub title: String,
    pub canonical_url: String,
    pub markup: String,
    /// Extra view markup placed before and after the snippet box.
    pub before_content: String,
    pub after_content: String,
}

/// What the republish route should do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    NotFound,
    RedirectToCanonical(String),
    Render(String),
}

pub mod content_store;
pub mod db_operations;
