//! SQLite-backed article store.
//!
//! Two tables: `article_hashes`, the durable uniqueness set of dedup keys,
//! and `articles`, the appended records. The schema is bootstrapped on open.

mod articles;
mod schema;
mod types;

pub use schema::Database;
pub use types::{ArticleRecord, DatabaseError, DedupKey, StoredArticle};
