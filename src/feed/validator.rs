use super::fetcher::Fetcher;
use super::parser::parse_feed;

/// Outcome of checking a URL for a usable feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    /// Fetched and judged a usable feed
    Valid,
    /// Fetched, but not a usable feed under the requested strictness
    Invalid,
    /// Could not be fetched (network error, timeout, non-2xx status)
    Unavailable,
}

impl FeedStatus {
    pub fn is_valid(self) -> bool {
        self == FeedStatus::Valid
    }
}

/// Decides whether raw bytes are a usable RSS/Atom feed.
///
/// Minor XML defects are tolerated as long as entries can be salvaged. With
/// `strict`, a feed must also contain at least one entry.
///
/// ```
/// use feedscout::feed::is_valid_feed;
///
/// let empty = br#"<rss version="2.0"><channel><title>t</title></channel></rss>"#;
/// assert!(is_valid_feed(empty, false));
/// assert!(!is_valid_feed(empty, true));
/// assert!(!is_valid_feed(b"<html><body>hi</body></html>", false));
/// ```
pub fn is_valid_feed(raw: &[u8], strict: bool) -> bool {
    parse_feed(raw).is_valid(strict)
}

/// Fetches `url` and classifies it. Never fails: fetch errors become
/// [`FeedStatus::Unavailable`].
pub async fn check_url(fetcher: &Fetcher, url: &str, strict: bool) -> FeedStatus {
    let bytes = match fetcher.fetch_bytes(url).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "Feed unavailable");
            return FeedStatus::Unavailable;
        }
    };

    let parsed = parse_feed(&bytes);
    if parsed.is_valid(strict) {
        FeedStatus::Valid
    } else {
        tracing::debug!(
            url = %url,
            malformed = parsed.malformed,
            entries = parsed.entries.len(),
            error = parsed.error.as_deref().unwrap_or(""),
            "Not a valid feed"
        );
        FeedStatus::Invalid
    }
}

/// Boolean view of [`check_url`]: unavailable counts as invalid.
pub async fn validate_url(fetcher: &Fetcher, url: &str, strict: bool) -> bool {
    check_url(fetcher, url, strict).await.is_valid()
}
