//! Remote catalog payloads
//!
//! `/track_list` returns every playlist of the user with its tracks. Entries
//! are decoded one at a time so a single malformed track or playlist costs
//! only itself.

use crate::error::{Result, SyncError};
use core_library::Track;
use serde::Deserialize;
use serde_json::Value;

/// One `/track_list` response
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogPage {
    #[serde(default)]
    pub playlists: Vec<Value>,
    /// The server stopped early, more entries exist
    #[serde(default)]
    pub partial: bool,
    /// Continuation cursor for the next page
    #[serde(default)]
    pub next: Option<String>,
}

/// A playlist entry with its undecoded tracks
#[derive(Debug, Clone, Deserialize)]
pub struct RemotePlaylist {
    pub name: String,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub tracks: Vec<Value>,
}

impl RemotePlaylist {
    pub fn parse(value: &Value) -> Result<Self> {
        let playlist = RemotePlaylist::deserialize(value)
            .map_err(|e| SyncError::Data(format!("malformed playlist entry: {}", e)))?;
        if playlist.name.trim().is_empty() {
            return Err(SyncError::Data("playlist entry without a name".to_string()));
        }
        Ok(playlist)
    }
}

#[derive(Debug, Deserialize)]
struct RawTrack {
    path: String,
    mtime: Value,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    album: Option<String>,
    #[serde(default)]
    album_artist: Option<String>,
    #[serde(default)]
    year: Option<i64>,
    #[serde(default)]
    artists: Option<Vec<String>>,
}

/// Decode one catalog track into replica metadata
///
/// `path` and `mtime` are required. The version stamp may arrive as a string
/// or a number and is kept as text.
pub fn parse_track(value: &Value, playlist: &str) -> Result<Track> {
    let raw = RawTrack::deserialize(value)
        .map_err(|e| SyncError::Data(format!("malformed track entry: {}", e)))?;

    if raw.path.trim().is_empty() {
        return Err(SyncError::Data("track entry with an empty path".to_string()));
    }
    let mtime = version_stamp(&raw.mtime).ok_or_else(|| {
        SyncError::Data(format!("track '{}' has no usable mtime", raw.path))
    })?;

    let track = Track {
        path: raw.path,
        playlist: playlist.to_string(),
        duration: raw.duration.map(|d| d.round() as i64),
        title: raw.title,
        album: raw.album,
        album_artist: raw.album_artist,
        year: raw.year,
        mtime,
        artists: raw.artists.unwrap_or_default(),
    };
    track
        .validate()
        .map_err(|msg| SyncError::Data(format!("track '{}': {}", track.path, msg)))?;
    Ok(track)
}

/// The path of an entry, even when the rest of it does not decode
pub fn entry_path(value: &Value) -> Option<&str> {
    value
        .get("path")
        .and_then(Value::as_str)
        .filter(|p| !p.trim().is_empty())
}

/// Every readable track path of a playlist entry, decodable or not
pub fn entry_track_paths(value: &Value) -> Vec<&str> {
    value
        .get("tracks")
        .and_then(Value::as_array)
        .map(|tracks| tracks.iter().filter_map(entry_path).collect())
        .unwrap_or_default()
}

fn version_stamp(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
