//! # Repository Pattern Implementation
//!
//! Each table group has a trait describing the operations the sync engine
//! needs and a SQLite implementation over an `sqlx` pool.
//!
//! - `PlaylistRepository` - replicated playlist names (replica store)
//! - `TrackRepository` - track metadata, artists and content (replica store)
//! - `HistoryRepository` - the outgoing play history queue (queue store)
//!
//! Every mutating call commits before returning, so an interrupted cycle never
//! leaves a half-written unit behind.

pub mod history;
pub mod playlist;
pub mod track;

pub use history::{HistoryRepository, SqliteHistoryRepository};
pub use playlist::{PlaylistRepository, SqlitePlaylistRepository};
pub use track::{SqliteTrackRepository, TrackRepository};
