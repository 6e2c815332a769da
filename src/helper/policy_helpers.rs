use crate::helper::sanitization_helpers;
use crate::models::db_operations::site_db_operations;
use crate::models::RepublishPolicy;
use rusqlite::Connection;

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Reads the republish policy from the site options. Missing or blank options fall back to defaults.
pub fn load_policy(conn: &Connection) -> RepublishPolicy {
    let setting = |key: &str| site_db_operations::read_setting(conn, key).unwrap_or_default();

    let allowed_tags = match split_list(&setting("allowed_tags")) {
        tags if tags.is_empty() => sanitization_helpers::default_allowed_tags(),
        tags => tags,
    };

    let post_types = match split_list(&setting("republish_post_types")) {
        types if types.is_empty() => vec!["post".to_string()],
        types => types,
    };

    let timezone = match setting("timezone_string").trim() {
        "" => "UTC".to_string(),
        tz => tz.to_string(),
    };

    RepublishPolicy {
        license_statement: setting("license_statement"),
        allowed_tags,
        post_types,
        footer_template: setting("footer_template"),
        timezone,
        shortcode_tags: split_list(&setting("shortcode_tags")),
        tracking_id: setting("ga_tracking_id").trim().to_string(),
    }
}
