//! History queue repository
//!
//! Plays are appended by the player while offline and removed one at a time
//! once the server has acknowledged them. Rows are never updated.

use crate::error::{LibraryError, Result};
use crate::models::HistoryEvent;
use async_trait::async_trait;
use sqlx::{query, query_as, query_scalar, SqlitePool};

#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// Append a play to the queue
    ///
    /// # Returns
    /// The queue identifier of the new event
    async fn enqueue(&self, timestamp: i64, track: &str, playlist: &str) -> Result<i64>;

    /// Every queued event, oldest timestamp first; ties keep queue order
    async fn pending(&self) -> Result<Vec<HistoryEvent>>;

    /// Remove one acknowledged event
    ///
    /// # Returns
    /// - `Ok(true)` if the event was deleted
    /// - `Ok(false)` if it was already gone
    async fn delete(&self, id: i64) -> Result<bool>;

    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of HistoryRepository
pub struct SqliteHistoryRepository {
    pool: SqlitePool,
}

impl SqliteHistoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryRepository for SqliteHistoryRepository {
    async fn enqueue(&self, timestamp: i64, track: &str, playlist: &str) -> Result<i64> {
        if track.is_empty() {
            return Err(LibraryError::InvalidInput {
                field: "track".to_string(),
                message: "History track cannot be empty".to_string(),
            });
        }

        let result = query("INSERT INTO history (timestamp, track, playlist) VALUES (?, ?, ?)")
            .bind(timestamp)
            .bind(track)
            .bind(playlist)
            .execute(&self.pool)
            .await?;

        Ok(result.last_insert_rowid())
    }

    async fn pending(&self) -> Result<Vec<HistoryEvent>> {
        let events = query_as::<_, HistoryEvent>(
            "SELECT id, timestamp, track, playlist FROM history ORDER BY timestamp ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = query("DELETE FROM history WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<i64> {
        let count = query_scalar::<_, i64>("SELECT COUNT(*) FROM history")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
