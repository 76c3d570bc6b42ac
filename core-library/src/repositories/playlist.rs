//! Playlist repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::Playlist;
use async_trait::async_trait;
use sqlx::{query, query_as, query_scalar, SqlitePool};

/// Replicated playlist names
#[async_trait]
pub trait PlaylistRepository: Send + Sync {
    /// Insert the playlist if it is not present yet
    ///
    /// # Returns
    /// - `Ok(true)` if a row was created
    /// - `Ok(false)` if it already existed
    async fn ensure_exists(&self, name: &str) -> Result<bool>;

    /// All playlists, ordered by name
    async fn list(&self) -> Result<Vec<Playlist>>;

    /// Delete the named playlists in one transaction
    ///
    /// Missing names are ignored.
    ///
    /// # Returns
    /// Number of rows deleted
    async fn delete_many(&self, names: &[String]) -> Result<u64>;

    /// Count total playlists
    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of PlaylistRepository
pub struct SqlitePlaylistRepository {
    pool: SqlitePool,
}

impl SqlitePlaylistRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlaylistRepository for SqlitePlaylistRepository {
    async fn ensure_exists(&self, name: &str) -> Result<bool> {
        if name.trim().is_empty() {
            return Err(LibraryError::InvalidInput {
                field: "playlist".to_string(),
                message: "Playlist name cannot be empty".to_string(),
            });
        }

        let result = query("INSERT INTO playlist (path) VALUES (?) ON CONFLICT (path) DO NOTHING")
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> Result<Vec<Playlist>> {
        let playlists = query_as::<_, Playlist>("SELECT path FROM playlist ORDER BY path")
            .fetch_all(&self.pool)
            .await?;

        Ok(playlists)
    }

    async fn delete_many(&self, names: &[String]) -> Result<u64> {
        if names.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut deleted = 0;
        for name in names {
            deleted += query("DELETE FROM playlist WHERE path = ?")
                .bind(name)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;

        Ok(deleted)
    }

    async fn count(&self) -> Result<i64> {
        let count = query_scalar::<_, i64>("SELECT COUNT(*) FROM playlist")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_replica_pool;

    async fn repo() -> SqlitePlaylistRepository {
        SqlitePlaylistRepository::new(create_test_replica_pool().await.unwrap())
    }

    #[tokio::test]
    async fn test_ensure_exists_is_idempotent() {
        let repo = repo().await;

        assert!(repo.ensure_exists("Rock").await.unwrap());
        assert!(!repo.ensure_exists("Rock").await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_is_sorted() {
        let repo = repo().await;
        repo.ensure_exists("Rock").await.unwrap();
        repo.ensure_exists("Jazz").await.unwrap();

        let names: Vec<String> = repo
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Jazz", "Rock"]);
    }

    #[tokio::test]
    async fn test_delete_many_ignores_missing() {
        let repo = repo().await;
        repo.ensure_exists("Rock").await.unwrap();
        repo.ensure_exists("Jazz").await.unwrap();

        let deleted = repo
            .delete_many(&["Jazz".to_string(), "Blues".to_string()])
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(repo.delete_many(&[]).await.unwrap(), 0);
        assert_eq!(repo.list().await.unwrap(), vec![Playlist::new("Rock")]);
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let repo = repo().await;
        assert!(matches!(
            repo.ensure_exists("").await,
            Err(LibraryError::InvalidInput { .. })
        ));
    }
}
