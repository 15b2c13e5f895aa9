//! # Share Link Repository
//!
//! Key-value table behind short share links. Each row is a JSON snapshot
//! stored under a random token, with an absolute expiry.
//!
//! ```text
//! put("aB3-_x9Q", blob, 90 days)  →  expires_at = now + ttl
//! get("aB3-_x9Q")                 →  Some(blob)       before expiry
//!                                 →  None (row purged) after expiry
//! ```

use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;

#[derive(Debug, Clone)]
pub struct ShareLinkRepository {
    pool: SqlitePool,
}

impl ShareLinkRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ShareLinkRepository { pool }
    }

    /// Stores `blob` under `key`, replacing any previous value.
    pub async fn put(&self, key: &str, blob: &str, ttl: Duration) -> DbResult<()> {
        let now = Utc::now();
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expires_at = now.timestamp().saturating_add(ttl_secs);

        debug!(key = %key, bytes = blob.len(), expires_at, "Storing share link");

        sqlx::query(
            r#"
            INSERT INTO share_links (key, blob, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(key) DO UPDATE SET
                blob       = excluded.blob,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(key)
        .bind(blob)
        .bind(now)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetches a live blob. Expired rows are deleted and reported missing.
    pub async fn get(&self, key: &str) -> DbResult<Option<String>> {
        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT blob, expires_at FROM share_links WHERE key = ?1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some((blob, expires_at)) if expires_at > Utc::now().timestamp() => Ok(Some(blob)),
            Some(_) => {
                debug!(key = %key, "Share link expired");
                sqlx::query("DELETE FROM share_links WHERE key = ?1")
                    .bind(key)
                    .execute(&self.pool)
                    .await?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Deletes every expired row. Returns how many were removed.
    pub async fn purge_expired(&self) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM share_links WHERE expires_at <= ?1")
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            debug!(count = result.rows_affected(), "Purged expired share links");
        }
        Ok(result.rows_affected())
    }
}
