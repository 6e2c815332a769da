use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tera::{Context, Tera};
use thiserror::Error;
use crate::helper::{image_credit_helpers, sanitization_helpers};
use crate::models::content_store::{ContentStore, MediaAttribution};
use crate::models::db_operations::posts_db_operations::DbError;
use crate::models::{ContentItem, RenderedSnippet, RepublishPolicy};

/// A replaceable transform over a piece of markup, given the item it belongs to.
pub type ContentFilter = Box<dyn Fn(String, &ContentItem) -> String + Send + Sync>;

/// Extra markup for the republish page, rendered around the snippet box.
pub type ViewHook = Box<dyn Fn(&ContentItem) -> String + Send + Sync>;

/// Extension points of the snippet pipeline. Unset hooks leave their input unchanged,
/// except `strip_shortcodes`, whose fallback removes the policy's registered shortcodes.
#[derive(Default)]
pub struct SnippetHooks {
    pub strip_shortcodes: Option<ContentFilter>,
    pub republish_content: Option<ContentFilter>,
    pub article_markup: Option<ContentFilter>,
    pub before_content: Option<ViewHook>,
    pub after_content: Option<ViewHook>,
}

fn apply_view_hook(hook: &Option<ViewHook>, item: &ContentItem) -> String {
    hook.as_ref().map(|h| h(item)).unwrap_or_default()
}

fn apply_filter(filter: &Option<ContentFilter>, value: String, item: &ContentItem) -> String {
    match filter {
        Some(f) => f(value, item),
        None => value,
    }
}

/// Produces the attribution footer for an item. Output is expected entity-encoded.
pub trait FooterGenerator {
    fn create_footer(&self, item: &ContentItem) -> String;
}

/// Renders the site's footer template with Tera.
pub struct TemplateFooter<'a> {
    pub template: &'a str,
    pub site_url: &'a str,
    pub timezone: &'a str,
}

impl FooterGenerator for TemplateFooter<'_> {
    fn create_footer(&self, item: &ContentItem) -> String {
        if self.template.trim().is_empty() {
            return String::new();
        }

        let mut context = Context::new();
        context.insert("title", &item.title);
        context.insert("canonical_url", &item.canonical_url);
        context.insert("site_url", self.site_url);
        context.insert("published", &format_publish_date(item.published_at, self.timezone));

        match Tera::one_off(self.template, &context, true) {
            Ok(footer) => footer,
            Err(e) => {
                log::warn!("Footer template failed to render for post {}: {}", item.id, e);
                String::new()
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum SnippetError {
    #[error("Invalid post ID: {0}")]
    InvalidPostId(String),
    #[error("Content store error: {0}")]
    Store(#[from] DbError),
}

/// Formats a publish instant in the site timezone, e.g. `Jan 15 12:00pm UTC`.
/// Unknown timezone names fall back to UTC.
pub fn format_publish_date(instant: DateTime<Utc>, timezone: &str) -> String {
    let tz: Tz = match timezone.parse() {
        Ok(tz) => tz,
        Err(e) => {
            log::warn!("Unknown site timezone '{}', using UTC: {}", timezone, e);
            chrono_tz::UTC
        }
    };
    instant.with_timezone(&tz).format("%b %-d %-I:%M%P %Z").to_string()
}

/// The invisible image that reports a view of republished copy back to the site.
pub fn tracking_pixel_markup(site_url: &str, post_id: &str, tracking_id: &str) -> String {
    let query: String = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("republication-pixel", "true")
        .append_pair("post", post_id)
        .append_pair("ga", tracking_id)
        .finish();
    format!(
        "<img id=\"republication-tracker-tool-source\" src=\"{}\" style=\"width:1px;height:1px;\" alt=\"\">",
        html_escape::encode_double_quoted_attribute(&format!("{}/?{}", site_url, query))
    )
}

pub struct SnippetBuilder<'a> {
    pub policy: &'a RepublishPolicy,
    pub store: &'a dyn ContentStore,
    /// `None` when no image credits subsystem is installed; nothing is redacted then.
    pub attribution: Option<&'a dyn MediaAttribution>,
    pub footer: &'a dyn FooterGenerator,
    pub hooks: &'a SnippetHooks,
    pub site_url: &'a str,
}

impl SnippetBuilder<'_> {
    pub fn build(&self, post_id: &str) -> Result<RenderedSnippet, SnippetError> {
        let item = self
            .store
            .load_item(post_id)?
            .ok_or_else(|| SnippetError::InvalidPostId(post_id.to_string()))?;

        let body = self.transform_body(&item);
        let markup = self.assemble(&item, &body);
        let markup = sanitization_helpers::strip_presentation_attributes(&markup);
        let markup = apply_filter(&self.hooks.article_markup, markup, &item);

        let before_content = apply_view_hook(&self.hooks.before_content, &item);
        let after_content = apply_view_hook(&self.hooks.after_content, &item);

        Ok(RenderedSnippet {
            title: item.title,
            canonical_url: item.canonical_url,
            markup,
            before_content,
            after_content,
        })
    }

    /// Body stages, in order: shortcodes, comments, whitelist, paragraphs, image credits, content hook.
    pub fn transform_body(&self, item: &ContentItem) -> String {
        let content = match &self.hooks.strip_shortcodes {
            Some(hook) => hook(item.body.clone(), item),
            None => sanitization_helpers::strip_shortcodes(&item.body, &self.policy.shortcode_tags),
        };
        let content = sanitization_helpers::strip_comments(&content);
        let content = sanitization_helpers::kses(&content, &self.policy.allowed_tags);
        let content = sanitization_helpers::remove_empty_paragraphs(&sanitization_helpers::autop(&content));

        let content = match self.attribution {
            Some(attribution) => image_credit_helpers::redact_undistributable_images(&content, attribution),
            None => content,
        };

        apply_filter(&self.hooks.republish_content, content, item)
    }

    fn assemble(&self, item: &ContentItem, body: &str) -> String {
        let mut blocks: Vec<String> = Vec::new();

        if !item.title.is_empty() {
            blocks.push(format!("<h1>{}</h1>", html_escape::encode_text(&item.title)));
        }

        if let Some(subtitle) = item.subtitle.as_deref().filter(|s| !s.is_empty()) {
            blocks.push(format!("<h2>{}</h2>", html_escape::encode_text(subtitle)));
        }

        // Bylines come from trusted code and are already markup.
        if !item.byline.is_empty() {
            blocks.push(format!("<div>{}</div>", item.byline));
        }

        let date = format_publish_date(item.published_at, &self.policy.timezone);
        if !date.is_empty() {
            blocks.push(format!("<time>{}</time>", html_escape::encode_text(&date)));
        }

        if let Some(image) = &item.featured_image {
            let distributable = self
                .attribution
                .map_or(true, |a| image_credit_helpers::featured_image_is_distributable(item, a));
            if distributable && !image.markup.is_empty() {
                blocks.push(image.markup.clone());
            }
        }

        let body = body.trim();
        if !body.is_empty() {
            blocks.push(body.to_string());
        }

        if !item.canonical_url.is_empty() {
            blocks.push(format!(
                "<link rel=\"canonical\" href=\"{}\">",
                html_escape::encode_double_quoted_attribute(&item.canonical_url)
            ));
        }

        let footer = self.footer.create_footer(item);
        if !footer.is_empty() {
            blocks.push(html_escape::decode_html_entities(&footer).into_owned());
        }

        if !self.policy.tracking_id.trim().is_empty() {
            blocks.push(tracking_pixel_markup(self.site_url, &item.id, self.policy.tracking_id.trim()));
        }

        blocks.join("\n\n")
    }
}
