//! # Track Reconciler
//!
//! Pulls the remote catalog and diffs it against the replica.
//!
//! ## Workflow
//!
//! 1. Load the local version index (`path -> mtime`)
//! 2. Fetch `/track_list`, following continuation cursors of partial pages
//! 3. For every selected playlist, make sure a local row exists
//! 4. Classify each of its tracks: missing locally is new, a different
//!    version stamp is stale, an equal stamp is unchanged
//!
//! Unchanged tracks cause no download and no write. Malformed entries are
//! logged and skipped without failing the pass. A listing the server left
//! partial is accepted but flagged, so nothing is pruned against it. The same
//! holds for a listing with a playlist entry that does not decode.

use crate::catalog::{entry_path, entry_track_paths, parse_track, RemotePlaylist};
use crate::error::Result;
use crate::remote::RemoteClient;
use crate::selection::PlaylistSelection;
use core_library::{PlaylistRepository, Track, TrackRepository};
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Why a track has to be materialized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Not present locally
    New,
    /// Present with a different version stamp, or picked for a forced re-sync
    Stale,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::New => f.write_str("new"),
            ChangeKind::Stale => f.write_str("stale"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackChange {
    pub track: Track,
    pub kind: ChangeKind,
}

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// Tracks to materialize, in catalog order
    pub changed: Vec<TrackChange>,
    /// Every track path listed in a selected playlist
    pub seen_tracks: HashSet<String>,
    /// Every selected playlist name
    pub playlists: HashSet<String>,
    pub unchanged: u64,
    /// Entries skipped because they did not decode
    pub malformed: u64,
    /// Playlist entries skipped because they did not decode
    pub broken_playlists: u64,
    /// False when the server left the listing partial or a playlist was unreadable
    pub complete: bool,
    pub pages: u32,
}

pub struct TrackReconciler {
    remote: Arc<RemoteClient>,
    playlists: Arc<dyn PlaylistRepository>,
    tracks: Arc<dyn TrackRepository>,
    max_pages: u32,
    force_resync: f64,
}

impl TrackReconciler {
    pub fn new(
        remote: Arc<RemoteClient>,
        playlists: Arc<dyn PlaylistRepository>,
        tracks: Arc<dyn TrackRepository>,
    ) -> Self {
        Self {
            remote,
            playlists,
            tracks,
            max_pages: 16,
            force_resync: 0.0,
        }
    }

    /// Maximum number of catalog pages followed per pass
    pub fn with_max_pages(mut self, pages: u32) -> Self {
        self.max_pages = pages.max(1);
        self
    }

    /// Fraction of unchanged tracks re-downloaded anyway
    pub fn with_force_resync(mut self, ratio: f64) -> Self {
        self.force_resync = ratio.clamp(0.0, 1.0);
        self
    }

    #[instrument(skip(self), fields(selection = %selection))]
    pub async fn reconcile(&self, selection: &PlaylistSelection) -> Result<Reconciliation> {
        let versions = self.tracks.version_index().await?;
        debug!(local_tracks = versions.len(), "Loaded local version index");

        let mut result = Reconciliation::default();
        let mut classified = HashSet::new();
        let mut cursor: Option<String> = None;

        info!("Downloading track list");
        loop {
            let page = self.remote.track_list(cursor.as_deref()).await?;
            result.pages += 1;

            for entry in page.playlists {
                self.process_playlist(entry, selection, &versions, &mut classified, &mut result)
                    .await?;
            }

            if !page.partial {
                result.complete = result.broken_playlists == 0;
                if !result.complete {
                    warn!(
                        broken = result.broken_playlists,
                        "Catalog has unreadable playlists, treating it as incomplete"
                    );
                }
                break;
            }

            match page.next {
                Some(next) if result.pages < self.max_pages => {
                    debug!(pages = result.pages, "Catalog is partial, fetching next page");
                    cursor = Some(next);
                }
                Some(_) => {
                    warn!(
                        pages = result.pages,
                        "Catalog page limit reached, continuing with a partial catalog"
                    );
                    break;
                }
                None => {
                    warn!(
                        pages = result.pages,
                        "Server returned a partial catalog without a continuation, continuing with it"
                    );
                    break;
                }
            }
        }

        info!(
            playlists = result.playlists.len(),
            seen = result.seen_tracks.len(),
            changed = result.changed.len(),
            unchanged = result.unchanged,
            malformed = result.malformed,
            complete = result.complete,
            "Catalog reconciled"
        );
        Ok(result)
    }

    async fn process_playlist(
        &self,
        entry: serde_json::Value,
        selection: &PlaylistSelection,
        versions: &HashMap<String, String>,
        classified: &mut HashSet<String>,
        result: &mut Reconciliation,
    ) -> Result<()> {
        let playlist = match RemotePlaylist::parse(&entry) {
            Ok(playlist) => playlist,
            Err(e) => {
                // Its selection is unknown, so none of its tracks may be pruned.
                result
                    .seen_tracks
                    .extend(entry_track_paths(&entry).into_iter().map(str::to_string));
                warn!(error = %e, "Skipping malformed playlist entry");
                result.malformed += 1;
                result.broken_playlists += 1;
                return Ok(());
            }
        };

        if !selection.includes(&playlist.name, playlist.favorite) {
            debug!(playlist = %playlist.name, "Playlist not selected");
            return Ok(());
        }

        info!(playlist = %playlist.name, tracks = playlist.tracks.len(), "Processing playlist");
        if self.playlists.ensure_exists(&playlist.name).await? {
            debug!(playlist = %playlist.name, "Added playlist");
        }
        result.playlists.insert(playlist.name.clone());

        for value in &playlist.tracks {
            let track = match parse_track(value, &playlist.name) {
                Ok(track) => track,
                Err(e) => {
                    // Keep whatever copy exists locally rather than pruning it.
                    if let Some(path) = entry_path(value) {
                        result.seen_tracks.insert(path.to_string());
                    }
                    warn!(playlist = %playlist.name, error = %e, "Skipping malformed track entry");
                    result.malformed += 1;
                    continue;
                }
            };

            if !classified.insert(track.path.clone()) {
                debug!(path = %track.path, "Track already listed by an earlier playlist");
                continue;
            }
            result.seen_tracks.insert(track.path.clone());

            match classify(versions.get(&track.path), &track.mtime, self.force_resync) {
                Some(kind) => {
                    debug!(path = %track.path, kind = %kind, "Track changed");
                    result.changed.push(TrackChange { track, kind });
                }
                None => result.unchanged += 1,
            }
        }

        Ok(())
    }
}

/// Compare a remote version stamp with the local one
///
/// Returns `None` for tracks that need no work.
pub fn classify(local: Option<&String>, remote: &str, force_resync: f64) -> Option<ChangeKind> {
    match local {
        None => Some(ChangeKind::New),
        Some(local) if local != remote => Some(ChangeKind::Stale),
        Some(_) if force_resync > 0.0 && rand::thread_rng().gen_bool(force_resync.min(1.0)) => {
            Some(ChangeKind::Stale)
        }
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        let abc = "abc".to_string();
        assert_eq!(classify(None, "abc", 0.0), Some(ChangeKind::New));
        assert_eq!(classify(Some(&abc), "def", 0.0), Some(ChangeKind::Stale));
        assert_eq!(classify(Some(&abc), "abc", 0.0), None);
    }

    #[test]
    fn test_classify_forced() {
        let abc = "abc".to_string();
        assert_eq!(classify(Some(&abc), "abc", 1.0), Some(ChangeKind::Stale));
        // Never forces a missing track to anything but new.
        assert_eq!(classify(None, "abc", 1.0), Some(ChangeKind::New));
    }

    #[test]
    fn test_change_kind_display() {
        assert_eq!(ChangeKind::New.to_string(), "new");
        assert_eq!(ChangeKind::Stale.to_string(), "stale");
    }
}
