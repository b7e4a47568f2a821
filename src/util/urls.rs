use thiserror::Error;
use url::{Host, Url};

/// Errors that can occur while accepting a URL as a feed or site root.
#[derive(Error, Debug)]
pub enum UrlError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
}

/// Parses a URL string and checks it is fetchable over HTTP(S).
///
/// # Examples
///
/// ```
/// use feedscout::util::parse_http_url;
///
/// let url = parse_http_url("https://example.com/feed.xml").unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
///
/// assert!(parse_http_url("file:///etc/passwd").is_err());
/// assert!(parse_http_url("not a url").is_err());
/// ```
pub fn parse_http_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_owned())),
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    Ok(url)
}

/// Returns `scheme://host[:port]` for a URL, without path or trailing slash.
pub fn origin_of(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    }
}

/// Computes the host variants of a site root, in the order discovery tries them.
///
/// The root's own origin comes first, followed by its counterpart with the
/// leading `www.` added or removed. IP literals and `localhost` have no
/// counterpart.
///
/// ```
/// use feedscout::util::{host_variants, parse_http_url};
///
/// let root = parse_http_url("https://www.example.com/news").unwrap();
/// assert_eq!(
///     host_variants(&root),
///     vec!["https://www.example.com", "https://example.com"]
/// );
/// ```
pub fn host_variants(root: &Url) -> Vec<String> {
    let own = origin_of(root);
    let mut variants = vec![own.clone()];

    let domain = match root.host() {
        Some(Host::Domain(domain)) if domain != "localhost" => domain,
        _ => return variants,
    };

    let counterpart = match domain.strip_prefix("www.") {
        Some(bare) if !bare.is_empty() => bare.to_owned(),
        Some(_) => return variants,
        None => format!("www.{domain}"),
    };

    let mut other = root.clone();
    if other.set_host(Some(&counterpart)).is_ok() {
        let other = origin_of(&other);
        if other != own {
            variants.push(other);
        }
    }

    variants
}

/// Resolves a potentially relative href against a base URL.
///
/// Returns `None` when the result is not an http(s) URL (`mailto:`,
/// `javascript:`, unparseable input).
pub fn resolve_url(href: &str, base: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let resolved = base.join(href).ok()?;
    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}
