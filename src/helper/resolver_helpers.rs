use crate::models::content_store::ContentStore;
use crate::models::{Outcome, RepublishPolicy};

/// Decides what a request for `/{endpoint}/{path_suffix}` gets.
///
/// Never fails: a lookup error is logged and treated like a suffix that matches nothing.
pub fn resolve(path_suffix: &str, store: &dyn ContentStore, policy: &RepublishPolicy) -> Outcome {
    let post_id = match store.url_to_post_id(path_suffix) {
        Ok(Some(id)) => id,
        Ok(None) => {
            log::debug!("Republish path '{}' does not match any post", path_suffix);
            return Outcome::NotFound;
        }
        Err(e) => {
            log::warn!("URL lookup failed for republish path '{}': {}", path_suffix, e);
            return Outcome::NotFound;
        }
    };

    let item = match store.load_item(&post_id) {
        Ok(Some(item)) => item,
        Ok(None) => return Outcome::NotFound,
        Err(e) => {
            log::warn!("Could not load post {} for republishing: {}", post_id, e);
            return Outcome::NotFound;
        }
    };

    if item.opt_out {
        log::debug!("Post {} opted out of republishing", item.id);
        return Outcome::RedirectToCanonical(item.canonical_url);
    }

    let eligible = policy
        .post_types
        .iter()
        .any(|t| t.eq_ignore_ascii_case(&item.content_type));
    if !eligible {
        log::debug!("Post {} has type '{}', which is not republishable", item.id, item.content_type);
        return Outcome::RedirectToCanonical(item.canonical_url);
    }

    Outcome::Render(item.id)
}
