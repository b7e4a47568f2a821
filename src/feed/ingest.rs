use futures::stream::{self, StreamExt};
use serde::Serialize;
use thiserror::Error;

use super::fetcher::{FetchError, Fetcher};
use super::list::FeedDefinition;
use super::parser::{parse_feed, FeedEntry};
use crate::config::Config;
use crate::storage::{ArticleRecord, Database, DatabaseError, DedupKey};
use crate::util::clean_summary;

/// Source label used when neither the feed list nor the feed names one.
const UNKNOWN_SOURCE: &str = "?";

/// Why one feed could not be ingested. Never aborts sibling feeds.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// The body parsed as neither RSS nor Atom and nothing was salvaged
    #[error("Not a feed: {0}")]
    NotAFeed(String),
}

/// Knobs for one ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOptions {
    /// Entries taken from the top of each feed
    pub max_items_per_feed: usize,
    /// Feeds in flight at once
    pub concurrency: usize,
    pub summary_char_limit: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for IngestOptions {
    fn from(config: &Config) -> Self {
        Self {
            max_items_per_feed: config.max_items_per_feed,
            concurrency: config.ingest_concurrency,
            summary_char_limit: config.summary_char_limit,
        }
    }
}

/// Per-entry counts for one feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeedOutcome {
    pub inserted: usize,
    pub duplicates: usize,
    /// Entries without a timestamp or link
    pub skipped: usize,
}

/// Totals for a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub feeds_processed: usize,
    pub feeds_failed: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub skipped: usize,
}

impl IngestReport {
    fn record(&mut self, outcome: FeedOutcome) {
        self.feeds_processed += 1;
        self.inserted += outcome.inserted;
        self.duplicates += outcome.duplicates;
        self.skipped += outcome.skipped;
    }
}

/// Ingests every feed concurrently, at most `options.concurrency` at a time.
///
/// A feed that fails is logged with its URL and counted in
/// `feeds_failed`; the remaining feeds are unaffected. No ordering holds
/// across feeds; within a feed entries are stored in document order.
pub async fn ingest(
    db: &Database,
    fetcher: &Fetcher,
    feeds: &[FeedDefinition],
    options: &IngestOptions,
) -> IngestReport {
    let mut results = stream::iter(feeds)
        .map(|feed| async move {
            let result = ingest_feed(db, fetcher, feed, options).await;
            if let Err(e) = &result {
                tracing::warn!(feed = %feed.url, error = %e, "Failed to ingest feed");
            }
            result
        })
        .buffer_unordered(options.concurrency.max(1));

    let mut report = IngestReport::default();
    while let Some(result) = results.next().await {
        match result {
            Ok(outcome) => report.record(outcome),
            Err(_) => report.feeds_failed += 1,
        }
    }

    tracing::info!(
        feeds = report.feeds_processed,
        failed = report.feeds_failed,
        inserted = report.inserted,
        duplicates = report.duplicates,
        skipped = report.skipped,
        "Ingestion complete"
    );
    report
}

/// Fetches, parses and stores one feed.
///
/// The source label is the feed list's `source`, else the feed's own site
/// link. Only the first `max_items_per_feed` entries are considered.
pub async fn ingest_feed(
    db: &Database,
    fetcher: &Fetcher,
    feed: &FeedDefinition,
    options: &IngestOptions,
) -> Result<FeedOutcome, IngestError> {
    let bytes = fetcher.fetch_bytes(&feed.url).await?;
    let parsed = parse_feed(&bytes);

    if !parsed.is_valid(false) {
        return Err(IngestError::NotAFeed(parsed.error.unwrap_or_default()));
    }

    let source = feed
        .source
        .clone()
        .or(parsed.site_link)
        .unwrap_or_else(|| UNKNOWN_SOURCE.to_owned());

    let mut outcome = FeedOutcome::default();
    for entry in parsed.entries.iter().take(options.max_items_per_feed) {
        match store_entry(db, entry, &source, options.summary_char_limit).await? {
            Stored::Inserted => outcome.inserted += 1,
            Stored::Duplicate => outcome.duplicates += 1,
            Stored::Skipped => outcome.skipped += 1,
        }
    }

    tracing::debug!(
        feed = %feed.url,
        source = %source,
        inserted = outcome.inserted,
        duplicates = outcome.duplicates,
        skipped = outcome.skipped,
        "Ingested feed"
    );
    Ok(outcome)
}

enum Stored {
    Inserted,
    Duplicate,
    Skipped,
}

async fn store_entry(
    db: &Database,
    entry: &FeedEntry,
    source: &str,
    char_limit: usize,
) -> Result<Stored, DatabaseError> {
    let (Some(published), Some(link)) = (entry.published, entry.link.as_deref()) else {
        return Ok(Stored::Skipped);
    };

    let key = DedupKey::new(&entry.title, link);
    let record = ArticleRecord::new(
        &entry.title,
        clean_summary(entry, char_limit),
        link.to_owned(),
        source.to_owned(),
        published,
    );

    if db.insert_article(&key, &record).await? {
        Ok(Stored::Inserted)
    } else {
        Ok(Stored::Duplicate)
    }
}
