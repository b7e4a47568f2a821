//! Utility functions shared by discovery and ingestion.
//!
//! - **URL handling**: http(s)-only parsing, host variants, relative resolution
//! - **Text processing**: HTML-to-summary normalization and char-safe truncation
//!
//! # Examples
//!
//! ```
//! use feedscout::util::{parse_http_url, summarize_html};
//!
//! let url = parse_http_url("https://example.com/feed.xml").unwrap();
//! assert_eq!(url.host_str(), Some("example.com"));
//!
//! assert_eq!(summarize_html("<p>Fish &amp; chips</p>", 500), "Fish & chips");
//! ```

mod text;
mod urls;

pub use self::text::{
    clean_summary, collapse_whitespace, strip_control_chars, summarize_html, truncate_chars,
    DEFAULT_SUMMARY_LIMIT, ELLIPSIS,
};
pub use self::urls::{host_variants, origin_of, parse_http_url, resolve_url, UrlError};

/// Maximum stored title length, in characters.
pub const MAX_TITLE_CHARS: usize = 250;
