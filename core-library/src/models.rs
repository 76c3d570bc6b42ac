//! Domain models for the local replica and queue stores

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// A replicated playlist, identified by its unique name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, FromRow)]
pub struct Playlist {
    #[sqlx(rename = "path")]
    pub name: String,
}

impl Playlist {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Track metadata as stored in the replica
///
/// `path` is the catalog identity key. `mtime` is an opaque version stamp
/// assigned by the server and is only ever compared for equality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Track {
    pub path: String,
    pub playlist: String,
    /// Duration in seconds, when the server knows it
    pub duration: Option<i64>,
    pub title: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub year: Option<i64>,
    pub mtime: String,
    /// Artist names in server order
    #[sqlx(skip)]
    pub artists: Vec<String>,
}

impl Track {
    /// Validate the fields the store relies on
    pub fn validate(&self) -> Result<(), String> {
        if self.path.trim().is_empty() {
            return Err("Track path cannot be empty".to_string());
        }
        if self.playlist.trim().is_empty() {
            return Err("Track playlist cannot be empty".to_string());
        }
        if self.mtime.is_empty() {
            return Err("Track mtime cannot be empty".to_string());
        }
        if let Some(duration) = self.duration {
            if duration < 0 {
                return Err("Track duration cannot be negative".to_string());
            }
        }
        Ok(())
    }

    /// Display name for logs: the title when known, else the path
    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.path)
    }
}

/// Downloaded content for one track, always written as a unit
#[derive(Clone, PartialEq, Eq)]
pub struct ContentBlob {
    pub path: String,
    pub music_data: Vec<u8>,
    pub cover_data: Vec<u8>,
    /// Serialized lyrics payload as returned by the server
    pub lyrics_json: String,
}

impl ContentBlob {
    pub fn size(&self) -> usize {
        self.music_data.len() + self.cover_data.len() + self.lyrics_json.len()
    }
}

// Blobs are large; log their sizes instead.
impl fmt::Debug for ContentBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentBlob")
            .field("path", &self.path)
            .field("music_bytes", &self.music_data.len())
            .field("cover_bytes", &self.cover_data.len())
            .field("lyrics_bytes", &self.lyrics_json.len())
            .finish()
    }
}

/// A play recorded while offline, waiting to be delivered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct HistoryEvent {
    /// Monotonically increasing queue identifier
    pub id: i64,
    /// Unix seconds at which playback started
    pub timestamp: i64,
    pub track: String,
    pub playlist: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track() -> Track {
        Track {
            path: "rock/song.ogg".to_string(),
            playlist: "Rock".to_string(),
            duration: Some(200),
            title: None,
            album: None,
            album_artist: None,
            year: None,
            mtime: "abc".to_string(),
            artists: vec![],
        }
    }

    #[test]
    fn test_track_validation() {
        assert!(track().validate().is_ok());

        let mut bad = track();
        bad.path = " ".to_string();
        assert!(bad.validate().is_err());

        let mut bad = track();
        bad.mtime = String::new();
        assert!(bad.validate().is_err());

        let mut bad = track();
        bad.duration = Some(-1);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_display_name_falls_back_to_path() {
        let mut t = track();
        assert_eq!(t.display_name(), "rock/song.ogg");
        t.title = Some("Song".to_string());
        assert_eq!(t.display_name(), "Song");
    }

    #[test]
    fn test_content_debug_omits_bytes() {
        let blob = ContentBlob {
            path: "a.ogg".to_string(),
            music_data: vec![1, 2, 3],
            cover_data: vec![4],
            lyrics_json: "{}".to_string(),
        };
        let debug = format!("{:?}", blob);
        assert!(debug.contains("music_bytes: 3"));
        assert_eq!(blob.size(), 6);
    }
}
