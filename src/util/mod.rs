mod text;
mod url_validator;

pub use text::{collapse_whitespace, sanitize_description, strip_tags, truncate_chars};
pub use url_validator::{validate_feed_url, UrlValidationError};
