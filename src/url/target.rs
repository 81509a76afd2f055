use crate::url::sanitize::sanitize_url;
use crate::{UrlError, UrlResult};
use url::Url;

/// Parses a fetch target, rejecting anything that cannot be requested over HTTP
///
/// # Arguments
///
/// * `url_str` - The (already sanitized) URL string
///
/// # Returns
///
/// * `Ok(Url)` - An absolute http(s) URL with a host
/// * `Err(UrlError)` - The URL is malformed
pub fn parse_target(url_str: &str) -> UrlResult<Url> {
    let url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    Ok(url)
}

/// Builds the `Host` header value for a request to `url`
///
/// The port is only included when it differs from the scheme's default.
pub fn host_header(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host.to_string()),
    }
}

/// Resolves a redirect `Location` against the URL that produced it
///
/// The location is sanitized the same way submitted URLs are, and may be
/// relative.
pub fn resolve_redirect(current: &Url, location: &str) -> UrlResult<String> {
    let location = sanitize_url(location.trim());
    let next = current
        .join(&location)
        .map_err(|e| UrlError::Parse(e.to_string()))?;
    Ok(next.to_string())
}
