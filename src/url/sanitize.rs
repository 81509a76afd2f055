/// Canonicalizes a URL string for use as a registry key
///
/// Only spaces are rewritten (as `%20`); no other normalization is applied,
/// so two spellings of the same resource are two distinct keys.
///
/// # Examples
///
/// ```
/// use crawldown::url::sanitize_url;
///
/// assert_eq!(sanitize_url("https://example.com/a b"), "https://example.com/a%20b");
/// ```
pub fn sanitize_url(url: &str) -> String {
    url.replace(' ', "%20")
}

/// Makes a page title usable as a file name
///
/// Path separators and colons become underscores so that a title can never
/// escape the download root or produce an invalid name on Windows.
///
/// # Examples
///
/// ```
/// use crawldown::url::sanitize_filename;
///
/// assert_eq!(sanitize_filename("TCP/IP: A Primer"), "TCP_IP_ A Primer");
/// ```
pub fn sanitize_filename(filename: &str) -> String {
    filename.replace(['/', ':'], "_")
}
