//! Feed discovery, validation and ingestion.
//!
//! - **Fetching**: bounded-timeout HTTP GETs that return undecoded feed bytes
//! - **Parsing**: RSS/Atom into explicit entries, salvaging malformed documents
//! - **Validation**: a total, strictness-aware "is this a usable feed" check
//! - **Discovery**: locate a working feed for a site via page links and path probes
//! - **Ingestion**: concurrent fetch → normalize → deduplicated store
//! - **Health**: strict checks and discovery-backed fixes for the feed list
//!
//! # Architecture
//!
//! - [`fetcher`] - HTTP client with size cap and optional retry
//! - [`parser`] - `feed-rs` parse with a `quick-xml` salvage pass
//! - [`validator`] - [`FeedStatus`] tri-state over fetch + parse
//! - [`discovery`] - host-variant scan using the validator as oracle
//! - [`ingest`] - bounded-concurrency pipeline into [`crate::storage::Database`]
//! - [`health`] - `check` and `fix` flows
//! - [`list`] - YAML feed list load/save
//!
//! # Example
//!
//! ```no_run
//! use feedscout::feed::{discover, default_probe_suffixes, Fetcher, FetcherSettings};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = Fetcher::new(FetcherSettings::default())?;
//! let feed = discover(&fetcher, "https://example.com", &default_probe_suffixes()).await;
//! println!("{feed:?}");
//! # Ok(())
//! # }
//! ```

pub mod discovery;
pub mod fetcher;
pub mod health;
pub mod ingest;
pub mod list;
pub mod parser;
pub mod validator;

pub use discovery::{
    default_probe_suffixes, discover, discover_origins, feed_candidates, DEFAULT_PROBE_SUFFIXES,
};
pub use fetcher::{FetchError, Fetcher, FetcherSettings, FEED_ACCEPT, USER_AGENT};
pub use health::{apply_fixes, check_feeds, discovery_root, propose_fixes, FeedFix, FixReport};
pub use ingest::{ingest, ingest_feed, FeedOutcome, IngestError, IngestOptions, IngestReport};
pub use list::{load_feed_list, save_feed_list, FeedDefinition, FeedListError};
pub use parser::{parse_feed, FeedEntry, ParsedFeed};
pub use validator::{check_url, is_valid_feed, validate_url, FeedStatus};
