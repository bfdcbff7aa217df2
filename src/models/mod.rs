// src/models/mod.rs

pub mod book;
pub mod certificate;
pub mod course;
pub mod message;
pub mod progress;
pub mod quiz_attempt;
pub mod user;

use url::Url;

/// Validates that a string is a correctly formatted URL.
pub(crate) fn validate_url_string(url: &str) -> Result<(), validator::ValidationError> {
    if Url::parse(url).is_err() {
        return Err(validator::ValidationError::new("invalid_url"));
    }
    Ok(())
}
