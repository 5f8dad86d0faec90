use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors that can occur while validating the upstream base URL.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// Plain HTTP pointed at anything other than a loopback host.
    #[error("Insecure base URL: HTTPS required (except localhost for testing)")]
    InsecureBaseUrl,
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
}

/// Validates the configured upstream base URL.
///
/// The base must be `https`, except that `http` is accepted for
/// `localhost` / loopback addresses so tests can point the fetcher at a
/// local mock server. Query strings and fragments are dropped; the fetcher
/// appends its own path and query.
///
/// # Examples
///
/// ```
/// use quji_rss::util::validate_base_url;
///
/// assert!(validate_base_url("https://n.ifun.cool").is_ok());
/// assert!(validate_base_url("http://127.0.0.1:8080").is_ok());
/// assert!(validate_base_url("http://n.ifun.cool").is_err());
/// assert!(validate_base_url("ftp://n.ifun.cool").is_err());
/// ```
pub fn validate_base_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let mut url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "https" => {}
        "http" => {
            if !is_loopback_host(&url) {
                return Err(UrlValidationError::InsecureBaseUrl);
            }
            tracing::debug!(base_url = %url, "Using non-HTTPS base URL (localhost only)");
        }
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(UrlValidationError::MissingHost);
    }

    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Builds the `Host` header value for a URL: the host, plus the port when it
/// differs from the scheme default.
pub fn host_header(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

fn is_loopback_host(url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    if host == "localhost" {
        return true;
    }

    // Strip brackets from IPv6 addresses for parsing
    let host_for_parse = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    host_for_parse
        .parse::<IpAddr>()
        .map(|ip| ip.is_loopback())
        .unwrap_or(false)
}
