use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use crate::models::content_store::MediaAttribution;
use crate::models::ContentItem;

fn attachment_image_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<img[^>]+class="[^"]*\bwp-image-(\d+)\b[^"]*"[^>]*>"#).expect("valid attachment image pattern")
    })
}

/// Every `<img>` tag in `content` that names a media attachment, grouped by attachment id.
pub fn find_attachment_images(content: &str) -> BTreeMap<i64, Vec<String>> {
    let mut found: BTreeMap<i64, Vec<String>> = BTreeMap::new();
    for caps in attachment_image_regex().captures_iter(content) {
        let Ok(media_id) = caps[1].parse::<i64>() else {
            continue;
        };
        let tag = caps[0].to_string();
        let tags = found.entry(media_id).or_default();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    found
}

/// Removes the `<figure>` around each image whose credit does not allow redistribution.
///
/// The figure is found by pattern, not by parsing: an image that is not the first thing inside
/// a figure (an optional wrapping link aside) is left in place.
pub fn redact_undistributable_images(content: &str, attribution: &dyn MediaAttribution) -> String {
    let mut output = content.to_string();

    for (media_id, tags) in find_attachment_images(content) {
        if attribution.can_distribute(media_id) {
            continue;
        }

        for tag in tags {
            let pattern = format!(
                r"(?s)<figure[^>]*>\s*(?:<a[^>]*>\s*)?{}.*?</figure>",
                regex::escape(&tag)
            );
            match Regex::new(&pattern) {
                Ok(re) => {
                    let redacted = re.replace_all(&output, "").into_owned();
                    if redacted.len() == output.len() {
                        log::debug!("Image {} is not distributable but has no enclosing figure", media_id);
                    }
                    output = redacted;
                }
                Err(e) => log::warn!("Could not build redaction pattern for image {}: {}", media_id, e),
            }
        }
    }

    output
}

/// The featured image survives only when it has no media id or its credit allows redistribution.
pub fn featured_image_is_distributable(item: &ContentItem, attribution: &dyn MediaAttribution) -> bool {
    match &item.featured_image {
        Some(image) => attribution.can_distribute(image.media_id),
        None => true,
    }
}
