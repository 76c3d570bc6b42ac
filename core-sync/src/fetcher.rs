//! # Content Fetcher
//!
//! Downloads audio, cover art and lyrics for one changed track, in that
//! order, and stores them together with the track metadata in a single
//! replica transaction. A failed download leaves the track untouched locally
//! and it is picked up again by the next cycle.

use crate::error::{Result, SyncError};
use crate::reconciler::{ChangeKind, TrackChange};
use crate::remote::RemoteClient;
use core_library::{ContentBlob, TrackRepository};
use core_runtime::config::SyncSettings;
use std::sync::Arc;
use tracing::{debug, info, instrument};

pub struct ContentFetcher {
    remote: Arc<RemoteClient>,
    tracks: Arc<dyn TrackRepository>,
    audio_quality: String,
    cover_quality: String,
}

impl ContentFetcher {
    pub fn new(
        remote: Arc<RemoteClient>,
        tracks: Arc<dyn TrackRepository>,
        settings: &SyncSettings,
    ) -> Self {
        Self {
            remote,
            tracks,
            audio_quality: settings.audio_quality.clone(),
            cover_quality: settings.cover_quality.clone(),
        }
    }

    /// Download and store one track
    ///
    /// # Errors
    ///
    /// Download failures are returned before anything is written. A store
    /// failure rolls back the whole track.
    #[instrument(skip(self, change), fields(path = %change.track.path, kind = %change.kind))]
    pub async fn materialize(&self, change: &TrackChange) -> Result<()> {
        let path = change.track.path.as_str();

        let music_data = self.remote.download_audio(path, &self.audio_quality).await?;
        if music_data.is_empty() {
            return Err(SyncError::Data(format!("empty audio for '{}'", path)));
        }
        let cover_data = self.remote.download_cover(path, &self.cover_quality).await?;
        let lyrics_json = self.remote.download_lyrics(path).await?;

        let content = ContentBlob {
            path: path.to_string(),
            music_data: music_data.to_vec(),
            cover_data: cover_data.to_vec(),
            lyrics_json,
        };
        debug!(bytes = content.size(), "Downloaded content");

        self.tracks.store_with_content(&change.track, &content).await?;

        match change.kind {
            ChangeKind::New => info!(title = %change.track.display_name(), "Downloaded new track"),
            ChangeKind::Stale => info!(title = %change.track.display_name(), "Updated track"),
        }
        Ok(())
    }
}
