use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use super::fetcher::Fetcher;
use super::validator::{check_url, FeedStatus};
use crate::util::{host_variants, parse_http_url, resolve_url};

/// Path suffixes probed, in order, when a homepage does not link a feed.
pub const DEFAULT_PROBE_SUFFIXES: &[&str] = &[
    "feed",
    "feed/",
    "rss",
    "rss/",
    "RSS",
    "RSS/",
    "rss.xml",
    "feed.xml",
    "atom.xml",
    "index.xml",
    "feeds/posts/default",
    "rss/2.0",
    "rss/2.0/",
    "rss/2.0/portada",
    "rss/2.0/portada/",
];

/// `href`/`src` values that look like they might point at a feed.
static FEED_HINT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)rss|feeds?|\.xml|\.rss|\.atom").expect("feed hint regex"));

static LINKED_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[href], [src]").expect("linked selector"));

static BASE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("base[href]").expect("base selector"));

/// Owned copy of [`DEFAULT_PROBE_SUFFIXES`], the shape configuration uses.
pub fn default_probe_suffixes() -> Vec<String> {
    DEFAULT_PROBE_SUFFIXES.iter().map(|s| (*s).to_owned()).collect()
}

/// Finds a working feed for a site root.
///
/// Each host variant of `root` (own host first, then the `www.` counterpart)
/// is scanned start to finish before the next: the homepage's feed-like links
/// first, then every probe suffix in order. A probe that is reachable but not
/// a feed is scanned as an HTML index page. The first candidate that
/// validates (non-strict) is returned, so the result is deterministic for a
/// fixed set of responses.
///
/// Returns `None` when `root` is not an http(s) URL or nothing validates.
pub async fn discover(fetcher: &Fetcher, root: &str, suffixes: &[String]) -> Option<String> {
    let root_url = match parse_http_url(root) {
        Ok(url) => url,
        Err(e) => {
            tracing::debug!(root = %root, error = %e, "Cannot discover from invalid root");
            return None;
        }
    };

    let found = discover_origins(fetcher, &host_variants(&root_url), suffixes).await;
    match &found {
        Some(feed) => tracing::debug!(root = %root, feed = %feed, "Discovered feed"),
        None => tracing::debug!(root = %root, "No feed discovered"),
    }
    found
}

/// Scans each origin start to finish, in order, and returns the first feed
/// that validates. Validation results are shared across origins.
pub async fn discover_origins(
    fetcher: &Fetcher,
    origins: &[String],
    suffixes: &[String],
) -> Option<String> {
    let mut scan = Scan::new(fetcher);
    for origin in origins {
        if let Some(found) = scan.host(origin.trim_end_matches('/'), suffixes).await {
            return Some(found);
        }
    }
    None
}

/// Collects feed-like `href`/`src` values from an HTML page, resolved against
/// the page's `<base href>` (or the page URL) and deduplicated in first-seen
/// order.
///
/// ```
/// use feedscout::feed::feed_candidates;
/// use url::Url;
///
/// let page = Url::parse("https://example.com/").unwrap();
/// let html = r#"<link rel="alternate" type="application/rss+xml" href="/feed.xml">
///               <a href="/about">About</a>"#;
/// assert_eq!(feed_candidates(html, &page), vec!["https://example.com/feed.xml"]);
/// ```
pub fn feed_candidates(html: &str, page_url: &Url) -> Vec<String> {
    let document = Html::parse_document(html);

    let base = document
        .select(&BASE_SELECTOR)
        .next()
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .unwrap_or_else(|| page_url.clone());

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for element in document.select(&LINKED_SELECTOR) {
        for attr in ["href", "src"] {
            let Some(value) = element.value().attr(attr) else {
                continue;
            };
            if !FEED_HINT_RE.is_match(value) {
                continue;
            }
            if let Some(resolved) = resolve_url(value, &base) {
                if seen.insert(resolved.clone()) {
                    candidates.push(resolved);
                }
            }
        }
    }

    candidates
}

/// Per-call memo so no URL is validated or scraped twice.
struct Scan<'a> {
    fetcher: &'a Fetcher,
    checked: HashMap<String, FeedStatus>,
    scraped: HashSet<String>,
}

impl<'a> Scan<'a> {
    fn new(fetcher: &'a Fetcher) -> Self {
        Self {
            fetcher,
            checked: HashMap::new(),
            scraped: HashSet::new(),
        }
    }

    async fn host(&mut self, origin: &str, suffixes: &[String]) -> Option<String> {
        if let Some(found) = self.scrape(origin).await {
            return Some(found);
        }

        for suffix in suffixes {
            let probe = format!("{}/{}", origin, suffix.trim_start_matches('/'));
            match self.check(&probe).await {
                FeedStatus::Valid => return Some(probe),
                FeedStatus::Unavailable => continue,
                FeedStatus::Invalid => {}
            }
            if let Some(found) = self.scrape(&probe).await {
                return Some(found);
            }
        }

        None
    }

    /// Fetches `page` as HTML and returns the first feed-like link on it that
    /// validates.
    async fn scrape(&mut self, page: &str) -> Option<String> {
        if !self.scraped.insert(page.to_owned()) {
            return None;
        }

        let page_url = Url::parse(page).ok()?;
        let html = match self.fetcher.fetch_text(page).await {
            Ok(html) => html,
            Err(e) => {
                tracing::debug!(page = %page, error = %e, "Page unavailable");
                return None;
            }
        };

        for candidate in feed_candidates(&html, &page_url) {
            if self.check(&candidate).await == FeedStatus::Valid {
                return Some(candidate);
            }
        }

        None
    }

    async fn check(&mut self, url: &str) -> FeedStatus {
        if let Some(status) = self.checked.get(url) {
            return *status;
        }

        let status = check_url(self.fetcher, url, false).await;
        tracing::debug!(candidate = %url, status = ?status, "Checked candidate");
        self.checked.insert(url.to_owned(), status);
        status
    }
}
