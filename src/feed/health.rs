use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashMap;

use super::discovery::discover;
use super::fetcher::Fetcher;
use super::list::FeedDefinition;
use super::validator::validate_url;
use crate::util::{origin_of, parse_http_url};

/// A broken feed and the working URL discovery found for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedFix {
    pub old_url: String,
    pub new_url: String,
}

/// Outcome of [`propose_fixes`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FixReport {
    /// Feeds that failed non-strict validation
    pub broken: usize,
    /// Replacements found, in feed-list order
    pub fixes: Vec<FeedFix>,
}

/// Validates every feed with `strict = true`, at most `concurrency` at once.
///
/// Returns the failing feeds in feed-list order.
pub async fn check_feeds<'a>(
    fetcher: &Fetcher,
    feeds: &'a [FeedDefinition],
    concurrency: usize,
) -> Vec<&'a FeedDefinition> {
    let statuses: Vec<bool> = stream::iter(feeds)
        .map(|feed| validate_url(fetcher, &feed.url, true))
        .buffered(concurrency.max(1))
        .collect()
        .await;

    feeds
        .iter()
        .zip(statuses)
        .filter_map(|(feed, ok)| (!ok).then_some(feed))
        .collect()
}

/// Finds replacement URLs for feeds that fail non-strict validation.
///
/// Nothing is mutated; pass the report to [`apply_fixes`] to rewrite a list.
pub async fn propose_fixes(
    fetcher: &Fetcher,
    feeds: &[FeedDefinition],
    suffixes: &[String],
    concurrency: usize,
) -> FixReport {
    let results: Vec<Option<Option<String>>> = stream::iter(feeds)
        .map(|feed| async move {
            if validate_url(fetcher, &feed.url, false).await {
                return None;
            }

            let Some(root) = discovery_root(feed) else {
                tracing::debug!(feed = %feed.url, "No discovery root for broken feed");
                return Some(None);
            };

            tracing::debug!(feed = %feed.url, root = %root, "Feed broken, discovering");
            Some(discover(fetcher, &root, suffixes).await)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut report = FixReport::default();
    for (feed, result) in feeds.iter().zip(results) {
        let Some(found) = result else {
            continue;
        };
        report.broken += 1;
        if let Some(new_url) = found.filter(|new_url| *new_url != feed.url) {
            report.fixes.push(FeedFix {
                old_url: feed.url.clone(),
                new_url,
            });
        }
    }

    report
}

/// Rewrites every feed whose `url` has a fix. Order and extra keys are kept.
///
/// Returns the number of records changed.
pub fn apply_fixes(feeds: &mut [FeedDefinition], fixes: &[FeedFix]) -> usize {
    let replacements: HashMap<&str, &str> = fixes
        .iter()
        .map(|fix| (fix.old_url.as_str(), fix.new_url.as_str()))
        .collect();

    let mut patched = 0;
    for feed in feeds.iter_mut() {
        if let Some(new_url) = replacements.get(feed.url.as_str()) {
            feed.url = (*new_url).to_owned();
            patched += 1;
        }
    }
    patched
}

/// Site root to run discovery from for a broken feed.
///
/// A `source` that is a bare host name (`elpais.com`) is combined with the
/// feed URL's scheme; otherwise the feed URL's origin is used.
///
/// ```
/// use feedscout::feed::{discovery_root, FeedDefinition};
///
/// let feed = FeedDefinition::new("https://old.example.com/rss", "example.com");
/// assert_eq!(discovery_root(&feed).as_deref(), Some("https://example.com"));
///
/// let feed = FeedDefinition::new("https://old.example.com/rss", "Example News");
/// assert_eq!(discovery_root(&feed).as_deref(), Some("https://old.example.com"));
/// ```
pub fn discovery_root(feed: &FeedDefinition) -> Option<String> {
    let feed_url = parse_http_url(&feed.url).ok();
    let scheme = feed_url.as_ref().map_or("https", |url| url.scheme());

    if let Some(source) = feed.source.as_deref().map(str::trim) {
        if is_bare_host(source) {
            return Some(format!("{}://{}", scheme, source));
        }
    }

    feed_url.map(|url| origin_of(&url))
}

fn is_bare_host(label: &str) -> bool {
    !label.is_empty()
        && label.contains('.')
        && !label.starts_with('.')
        && !label.ends_with('.')
        && label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FetcherSettings;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <item><guid>1</guid><title>Post</title></item>
</channel></rss>"#;

    const EMPTY_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Quiet</title></channel></rss>"#;

    fn fetcher() -> Fetcher {
        Fetcher::new(FetcherSettings::default()).unwrap()
    }

    async fn mount(server: &MockServer, at: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    #[test]
    fn test_discovery_root_bare_host_source() {
        let feed = FeedDefinition::new("http://www.example.es/rss/old", "example.es");
        assert_eq!(discovery_root(&feed).as_deref(), Some("http://example.es"));
    }

    #[test]
    fn test_discovery_root_falls_back_to_origin() {
        let feed = FeedDefinition::new("https://news.example.com:8443/a/b.xml", "News!");
        assert_eq!(
            discovery_root(&feed).as_deref(),
            Some("https://news.example.com:8443")
        );

        let mut feed = FeedDefinition::new("https://news.example.com/x", "");
        feed.source = None;
        assert_eq!(discovery_root(&feed).as_deref(), Some("https://news.example.com"));
    }

    #[test]
    fn test_discovery_root_unusable() {
        let mut feed = FeedDefinition::new("not a url", "");
        feed.source = None;
        assert_eq!(discovery_root(&feed), None);
    }

    #[test]
    fn test_apply_fixes_rewrites_in_place() {
        let mut feeds = vec![
            FeedDefinition::new("https://a.example/old", "a.example"),
            FeedDefinition::new("https://b.example/feed", "b.example"),
        ];
        let fixes = vec![FeedFix {
            old_url: "https://a.example/old".into(),
            new_url: "https://a.example/rss.xml".into(),
        }];

        assert_eq!(apply_fixes(&mut feeds, &fixes), 1);
        assert_eq!(feeds[0].url, "https://a.example/rss.xml");
        assert_eq!(feeds[0].source.as_deref(), Some("a.example"));
        assert_eq!(feeds[1].url, "https://b.example/feed");
    }

    #[tokio::test]
    async fn test_check_feeds_reports_failures_in_order() {
        let server = MockServer::start().await;
        mount(&server, "/ok", VALID_RSS).await;
        mount(&server, "/empty", EMPTY_RSS).await;

        let feeds = vec![
            FeedDefinition::new(format!("{}/missing", server.uri()), "missing"),
            FeedDefinition::new(format!("{}/ok", server.uri()), "ok"),
            FeedDefinition::new(format!("{}/empty", server.uri()), "empty"),
        ];

        let failing = check_feeds(&fetcher(), &feeds, 12).await;
        let labels: Vec<&str> = failing.iter().map(|f| f.label()).collect();
        assert_eq!(labels, vec!["missing", "empty"]);
    }

    #[tokio::test]
    async fn test_propose_fixes_finds_replacement() {
        let server = MockServer::start().await;
        mount(&server, "/ok", VALID_RSS).await;
        mount(&server, "/rss.xml", VALID_RSS).await;

        // Sources are not bare hosts, so discovery starts at the mock origin
        let feeds = vec![
            FeedDefinition::new(format!("{}/ok", server.uri()), "Healthy"),
            FeedDefinition::new(format!("{}/gone", server.uri()), "Broken"),
        ];
        let suffixes = vec!["feed".to_owned(), "rss.xml".to_owned()];

        let report = propose_fixes(&fetcher(), &feeds, &suffixes, 12).await;
        assert_eq!(
            report,
            FixReport {
                broken: 1,
                fixes: vec![FeedFix {
                    old_url: format!("{}/gone", server.uri()),
                    new_url: format!("{}/rss.xml", server.uri()),
                }],
            }
        );
    }

    #[tokio::test]
    async fn test_propose_fixes_broken_without_replacement() {
        let server = MockServer::start().await;
        let feeds = vec![FeedDefinition::new(format!("{}/gone", server.uri()), "Broken")];

        let report = propose_fixes(&fetcher(), &feeds, &[], 12).await;
        assert_eq!(report.broken, 1);
        assert!(report.fixes.is_empty());
    }
}
