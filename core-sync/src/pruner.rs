//! # Replica Pruner
//!
//! Removes local tracks and playlists that the latest complete catalog no
//! longer lists. Track content goes first; the metadata and artist rows follow
//! through the foreign key cascade.

use crate::error::Result;
use core_library::{PlaylistRepository, TrackRepository};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneOutcome {
    pub tracks: u64,
    pub playlists: u64,
}

pub struct ReplicaPruner {
    playlists: Arc<dyn PlaylistRepository>,
    tracks: Arc<dyn TrackRepository>,
}

impl ReplicaPruner {
    pub fn new(playlists: Arc<dyn PlaylistRepository>, tracks: Arc<dyn TrackRepository>) -> Self {
        Self { playlists, tracks }
    }

    /// Delete everything not in `seen_tracks` / `playlists`
    ///
    /// Must only be given the sets of a complete reconciliation pass.
    #[instrument(skip_all, fields(seen = seen_tracks.len(), selected = playlists.len()))]
    pub async fn prune(
        &self,
        seen_tracks: &HashSet<String>,
        playlists: &HashSet<String>,
    ) -> Result<PruneOutcome> {
        let stale_tracks: Vec<String> = self
            .tracks
            .paths()
            .await?
            .into_iter()
            .filter(|path| !seen_tracks.contains(path))
            .collect();
        for path in &stale_tracks {
            debug!(path = %path, "Deleting track");
        }
        let tracks = self.tracks.delete_many(&stale_tracks).await?;

        let stale_playlists: Vec<String> = self
            .playlists
            .list()
            .await?
            .into_iter()
            .map(|playlist| playlist.name)
            .filter(|name| !playlists.contains(name))
            .collect();
        for name in &stale_playlists {
            debug!(playlist = %name, "Deleting playlist");
        }
        let playlists = self.playlists.delete_many(&stale_playlists).await?;

        if tracks > 0 || playlists > 0 {
            info!(tracks, playlists, "Pruned replica");
        }
        Ok(PruneOutcome { tracks, playlists })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_library::db::create_test_replica_pool;
    use core_library::{
        ContentBlob, SqlitePlaylistRepository, SqliteTrackRepository, Track,
    };

    async fn seed(tracks: &SqliteTrackRepository, path: &str, playlist: &str) {
        let track = Track {
            path: path.to_string(),
            playlist: playlist.to_string(),
            duration: Some(100),
            title: None,
            album: None,
            album_artist: None,
            year: None,
            mtime: "1".to_string(),
            artists: vec!["Band".to_string()],
        };
        let content = ContentBlob {
            path: path.to_string(),
            music_data: vec![1],
            cover_data: vec![2],
            lyrics_json: "null".to_string(),
        };
        tracks.store_with_content(&track, &content).await.unwrap();
    }

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_prunes_exactly_the_unseen() {
        let pool = create_test_replica_pool().await.unwrap();
        let playlists = Arc::new(SqlitePlaylistRepository::new(pool.clone()));
        let tracks = Arc::new(SqliteTrackRepository::new(pool.clone()));

        playlists.ensure_exists("Rock").await.unwrap();
        playlists.ensure_exists("Jazz").await.unwrap();
        seed(&tracks, "rock/a.ogg", "Rock").await;
        seed(&tracks, "rock/b.ogg", "Rock").await;
        seed(&tracks, "jazz/c.ogg", "Jazz").await;

        let pruner = ReplicaPruner::new(playlists.clone(), tracks.clone());
        let outcome = pruner
            .prune(&set(&["rock/a.ogg"]), &set(&["Rock"]))
            .await
            .unwrap();

        assert_eq!(outcome, PruneOutcome { tracks: 2, playlists: 1 });
        assert_eq!(tracks.paths().await.unwrap(), vec!["rock/a.ogg"]);
        assert!(tracks.content("rock/b.ogg").await.unwrap().is_none());
        assert_eq!(playlists.count().await.unwrap(), 1);

        // Nothing left to delete.
        let again = pruner
            .prune(&set(&["rock/a.ogg"]), &set(&["Rock"]))
            .await
            .unwrap();
        assert_eq!(again, PruneOutcome::default());
    }

    #[tokio::test]
    async fn test_selected_playlist_without_tracks_is_kept() {
        let pool = create_test_replica_pool().await.unwrap();
        let playlists = Arc::new(SqlitePlaylistRepository::new(pool.clone()));
        let tracks = Arc::new(SqliteTrackRepository::new(pool));

        playlists.ensure_exists("Rock").await.unwrap();
        seed(&tracks, "rock/a.ogg", "Rock").await;

        let outcome = ReplicaPruner::new(playlists.clone(), tracks.clone())
            .prune(&HashSet::new(), &set(&["Rock"]))
            .await
            .unwrap();

        assert_eq!(outcome.tracks, 1);
        assert_eq!(outcome.playlists, 0);
        assert_eq!(playlists.count().await.unwrap(), 1);
    }
}
