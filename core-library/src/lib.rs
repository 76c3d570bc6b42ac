//! # Local Stores
//!
//! Owns the two SQLite databases the sync agent works against and the
//! repositories used to read and mutate them.
//!
//! ## Overview
//!
//! - `db` opens the replica and queue pools and applies embedded migrations
//! - `models` holds the playlist, track, content and history types
//! - `repositories` exposes trait-based data access for each table group

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use db::{create_queue_pool, create_replica_pool, DatabaseConfig};
pub use error::{LibraryError, Result};
pub use models::{ContentBlob, HistoryEvent, Playlist, Track};
pub use repositories::{
    HistoryRepository, PlaylistRepository, SqliteHistoryRepository, SqlitePlaylistRepository,
    SqliteTrackRepository, TrackRepository,
};
