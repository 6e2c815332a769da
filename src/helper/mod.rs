pub mod image_credit_helpers;
pub mod policy_helpers;
pub mod resolver_helpers;
pub mod sanitization_helpers;
pub mod snippet_helpers;

#[cfg(test)]
pub(crate) mod test_support;
