use super::schema::Database;
use super::types::{ArticleRecord, DatabaseError, DedupKey, StoredArticle};

/// Maximum number of articles to return from any single query (OOM protection)
const MAX_ARTICLES: i64 = 2000;

impl Database {
    // ========================================================================
    // Article Operations
    // ========================================================================

    /// Records `key` and appends `record` as one atomic pair.
    ///
    /// Returns `Ok(false)` without writing anything when `key` is already in
    /// the uniqueness set. Either both rows become visible or neither does.
    pub async fn insert_article(
        &self,
        key: &DedupKey,
        record: &ArticleRecord,
    ) -> Result<bool, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let claimed = sqlx::query("INSERT OR IGNORE INTO article_hashes (url_hash) VALUES (?)")
            .bind(key.as_str())
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::from_sqlx)?
            .rows_affected();

        if claimed == 0 {
            tx.rollback().await.map_err(DatabaseError::from_sqlx)?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO articles (title, summary, url, source, published_iso) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&record.title)
        .bind(&record.summary)
        .bind(&record.url)
        .bind(&record.source)
        .bind(record.published_iso())
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok(true)
    }

    /// Number of stored articles.
    pub async fn article_count(&self) -> Result<i64, DatabaseError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    /// Number of keys in the uniqueness set.
    pub async fn dedup_key_count(&self) -> Result<i64, DatabaseError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM article_hashes")
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    /// Newest articles first, capped at 2000.
    pub async fn recent_articles(&self, limit: i64) -> Result<Vec<StoredArticle>, DatabaseError> {
        let limit = limit.clamp(0, MAX_ARTICLES);
        sqlx::query_as::<_, StoredArticle>(
            "SELECT id, title, summary, url, source, published_iso FROM articles \
             ORDER BY published_iso DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
