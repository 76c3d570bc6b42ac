//! Track repository trait and implementation
//!
//! Tracks are only ever written together with their content: the content row
//! is upserted first and the metadata row follows in the same transaction.
//! `track.path` references `content.path` with `ON DELETE CASCADE`, so
//! deleting content removes the metadata and artist rows too.

use crate::error::{LibraryError, Result};
use crate::models::{ContentBlob, Track};
use async_trait::async_trait;
use sqlx::{query, query_as, query_scalar, SqlitePool};
use std::collections::HashMap;

/// Track metadata and content
#[async_trait]
pub trait TrackRepository: Send + Sync {
    /// Find a track with its artists
    async fn find_by_path(&self, path: &str) -> Result<Option<Track>>;

    /// Version stamp of every local track, keyed by path
    async fn version_index(&self) -> Result<HashMap<String, String>>;

    /// All local track paths
    async fn paths(&self) -> Result<Vec<String>>;

    /// Known duration of a track in seconds
    ///
    /// # Returns
    /// - `Ok(None)` if the track is unknown or has no duration
    async fn duration(&self, path: &str) -> Result<Option<i64>>;

    /// Upsert content, then metadata, then replace the artist set
    ///
    /// Runs as one transaction; nothing is visible unless all of it commits.
    ///
    /// # Errors
    /// Returns error if:
    /// - Track validation fails
    /// - Content and track paths differ
    /// - Database error occurs
    async fn store_with_content(&self, track: &Track, content: &ContentBlob) -> Result<()>;

    /// Delete content (and by cascade metadata) for the given paths in one
    /// transaction. Missing paths are ignored.
    ///
    /// # Returns
    /// Number of tracks deleted
    async fn delete_many(&self, paths: &[String]) -> Result<u64>;

    /// Content for a path, if stored
    async fn content(&self, path: &str) -> Result<Option<ContentBlob>>;

    /// Count total tracks
    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of TrackRepository
pub struct SqliteTrackRepository {
    pool: SqlitePool,
}

impl SqliteTrackRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TrackRepository for SqliteTrackRepository {
    async fn find_by_path(&self, path: &str) -> Result<Option<Track>> {
        let track = query_as::<_, Track>(
            r#"
            SELECT path, playlist, duration, title, album, album_artist, year, mtime
            FROM track
            WHERE path = ?
            "#,
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        let Some(mut track) = track else {
            return Ok(None);
        };

        track.artists = query_scalar::<_, String>(
            "SELECT artist FROM track_artist WHERE track = ? ORDER BY rowid",
        )
        .bind(path)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(track))
    }

    async fn version_index(&self) -> Result<HashMap<String, String>> {
        let rows = query_as::<_, (String, String)>("SELECT path, mtime FROM track")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().collect())
    }

    async fn paths(&self) -> Result<Vec<String>> {
        let paths = query_scalar::<_, String>("SELECT path FROM track ORDER BY path")
            .fetch_all(&self.pool)
            .await?;

        Ok(paths)
    }

    async fn duration(&self, path: &str) -> Result<Option<i64>> {
        let duration = query_scalar::<_, Option<i64>>("SELECT duration FROM track WHERE path = ?")
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;

        Ok(duration.flatten())
    }

    async fn store_with_content(&self, track: &Track, content: &ContentBlob) -> Result<()> {
        track.validate().map_err(|msg| LibraryError::InvalidInput {
            field: "track".to_string(),
            message: msg,
        })?;
        if track.path != content.path {
            return Err(LibraryError::InvalidInput {
                field: "content".to_string(),
                message: format!(
                    "Content path '{}' does not match track path '{}'",
                    content.path, track.path
                ),
            });
        }

        let mut tx = self.pool.begin().await?;

        // DO UPDATE rather than REPLACE: a replace deletes the row first and
        // the cascade would take the track with it.
        query(
            r#"
            INSERT INTO content (path, music_data, cover_data, lyrics_json)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (path) DO UPDATE SET
                music_data = excluded.music_data,
                cover_data = excluded.cover_data,
                lyrics_json = excluded.lyrics_json
            "#,
        )
        .bind(&content.path)
        .bind(content.music_data.as_slice())
        .bind(content.cover_data.as_slice())
        .bind(&content.lyrics_json)
        .execute(&mut *tx)
        .await?;

        query(
            r#"
            INSERT INTO track (path, playlist, duration, title, album, album_artist, year, mtime)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (path) DO UPDATE SET
                playlist = excluded.playlist,
                duration = excluded.duration,
                title = excluded.title,
                album = excluded.album,
                album_artist = excluded.album_artist,
                year = excluded.year,
                mtime = excluded.mtime
            "#,
        )
        .bind(&track.path)
        .bind(&track.playlist)
        .bind(track.duration)
        .bind(&track.title)
        .bind(&track.album)
        .bind(&track.album_artist)
        .bind(track.year)
        .bind(&track.mtime)
        .execute(&mut *tx)
        .await?;

        query("DELETE FROM track_artist WHERE track = ?")
            .bind(&track.path)
            .execute(&mut *tx)
            .await?;

        for artist in &track.artists {
            query("INSERT INTO track_artist (track, artist) VALUES (?, ?)")
                .bind(&track.path)
                .bind(artist)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_many(&self, paths: &[String]) -> Result<u64> {
        if paths.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut deleted = 0;
        for path in paths {
            deleted += query("DELETE FROM content WHERE path = ?")
                .bind(path)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;

        Ok(deleted)
    }

    async fn content(&self, path: &str) -> Result<Option<ContentBlob>> {
        let row = query_as::<_, (String, Vec<u8>, Vec<u8>, String)>(
            "SELECT path, music_data, cover_data, lyrics_json FROM content WHERE path = ?",
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(path, music_data, cover_data, lyrics_json)| ContentBlob {
            path,
            music_data,
            cover_data,
            lyrics_json,
        }))
    }

    async fn count(&self) -> Result<i64> {
        let count = query_scalar::<_, i64>("SELECT COUNT(*) FROM track")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
