use thiserror::Error;
use url::Url;

/// Errors that can occur when validating a configured feed URL.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
}

/// Validates a URL string for use as a feed source.
///
/// Feed sources come from a user-editable list, so this is a sanity check
/// rather than a trust boundary: the URL must parse and must use a plain or
/// encrypted HTTP scheme. Anything else (`file://`, `ftp://`, `data:`) is
/// rejected so the fetcher only ever talks HTTP.
///
/// # Errors
///
/// Returns [`UrlValidationError`] if the URL cannot be parsed or the scheme
/// is not `http`/`https`.
pub fn validate_feed_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }
}
