use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::util::{truncate_chars, MAX_TITLE_CHARS};

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Another process holds the database lock
    #[error("The database is locked by another process. Please wait for it to finish and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Maps lock-related sqlx errors to [`DatabaseError::InstanceLocked`].
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_message(&err.to_string()) {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

/// SQLITE_BUSY (5), SQLITE_LOCKED (6) and SQLITE_CANTOPEN (14) messages.
pub(crate) fn is_lock_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("sqlite_locked")
        || message.contains("unable to open database file")
}

// ============================================================================
// Dedup Key
// ============================================================================

/// Content hash identifying an article for deduplication.
///
/// Derived from the entry's `(title, link)` pair only, so a republished
/// entry with a new timestamp or summary is still a duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey(String);

impl DedupKey {
    pub fn new(title: &str, link: &str) -> Self {
        // Length prefix keeps ("a|b", "c") and ("a", "b|c") apart.
        let mut hasher = Sha256::new();
        hasher.update((title.len() as u64).to_le_bytes());
        hasher.update(title.as_bytes());
        hasher.update(link.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Article Types
// ============================================================================

/// A normalized article ready to be appended to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleRecord {
    /// At most [`MAX_TITLE_CHARS`] characters
    pub title: String,
    pub summary: String,
    pub url: String,
    pub source: String,
    pub published: DateTime<Utc>,
}

impl ArticleRecord {
    /// Builds a record, truncating the title to [`MAX_TITLE_CHARS`].
    pub fn new(
        title: &str,
        summary: String,
        url: String,
        source: String,
        published: DateTime<Utc>,
    ) -> Self {
        Self {
            title: truncate_chars(title, MAX_TITLE_CHARS).into_owned(),
            summary,
            url,
            source,
            published,
        }
    }

    /// UTC ISO-8601 timestamp as stored in `published_iso`.
    pub fn published_iso(&self) -> String {
        self.published.to_rfc3339_opts(SecondsFormat::Secs, false)
    }
}

/// A stored article as read back from the database.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct StoredArticle {
    pub id: i64,
    pub title: String,
    pub summary: String,
    pub url: String,
    pub source: String,
    pub published_iso: String,
}
