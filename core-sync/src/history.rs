//! # History Flusher
//!
//! Replays plays recorded offline to the server, oldest first.
//!
//! An event is deleted only after the server accepted it, and the first
//! failure stops the flush: later events never overtake an earlier one. Plays
//! longer than the scrobble threshold are flagged as eligible for the
//! server's external scrobbling.

use crate::error::Result;
use crate::remote::{HistoryPlayed, RemoteClient};
use core_library::{HistoryEvent, HistoryRepository, TrackRepository};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct HistoryFlusher {
    remote: Arc<RemoteClient>,
    history: Arc<dyn HistoryRepository>,
    tracks: Arc<dyn TrackRepository>,
    scrobble_threshold_secs: i64,
}

impl HistoryFlusher {
    pub fn new(
        remote: Arc<RemoteClient>,
        history: Arc<dyn HistoryRepository>,
        tracks: Arc<dyn TrackRepository>,
        scrobble_threshold_secs: i64,
    ) -> Self {
        Self {
            remote,
            history,
            tracks,
            scrobble_threshold_secs,
        }
    }

    /// Deliver every queued event
    ///
    /// # Returns
    /// Number of events delivered and removed
    ///
    /// # Errors
    /// The first delivery failure. Events delivered before it stay removed,
    /// the failing one and everything after it stay queued.
    #[instrument(skip(self))]
    pub async fn flush(&self) -> Result<u64> {
        let pending = self.history.pending().await?;
        if pending.is_empty() {
            debug!("History queue is empty");
            return Ok(0);
        }

        info!(pending = pending.len(), "Submitting history");
        let csrf = self.remote.csrf_token().await?;

        let mut delivered = 0u64;
        for event in &pending {
            if let Err(e) = self.deliver(&csrf, event).await {
                warn!(
                    id = event.id,
                    timestamp = event.timestamp,
                    track = %event.track,
                    delivered,
                    error = %e,
                    "History submission failed, remaining events stay queued"
                );
                return Err(e);
            }
            delivered += 1;
        }

        info!(delivered, "History submitted");
        Ok(delivered)
    }

    async fn deliver(&self, csrf: &str, event: &HistoryEvent) -> Result<()> {
        let lastfm_eligible = self.is_eligible(event).await?;

        self.remote
            .post_history(&HistoryPlayed {
                csrf,
                track: &event.track,
                playlist: &event.playlist,
                timestamp: event.timestamp,
                start_timestamp: event.timestamp,
                lastfm_eligible,
            })
            .await?;

        if !self.history.delete(event.id).await? {
            warn!(id = event.id, "Delivered history event was already removed");
        }
        debug!(id = event.id, track = %event.track, lastfm_eligible, "Delivered history event");
        Ok(())
    }

    async fn is_eligible(&self, event: &HistoryEvent) -> Result<bool> {
        match self.tracks.duration(&event.track).await? {
            Some(duration) => Ok(duration > self.scrobble_threshold_secs),
            None => {
                warn!(
                    track = %event.track,
                    "Duration unknown, reporting play as not eligible for scrobbling"
                );
                Ok(false)
            }
        }
    }
}
