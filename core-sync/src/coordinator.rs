//! # Sync Coordinator
//!
//! Runs one synchronization cycle against the library server.
//!
//! ## Workflow
//!
//! 1. Acquire a valid session token from `SessionManager`
//! 2. Flush the local history queue (`HistoryFlusher`)
//! 3. Fetch and diff the remote catalog (`TrackReconciler`)
//! 4. Materialize every new or stale track (`ContentFetcher`), one committed
//!    unit per track; a track whose download fails is skipped
//! 5. Prune replica entries the catalog no longer lists (`ReplicaPruner`),
//!    only when the catalog was complete
//! 6. Record `sync_last_success` and emit the completion event
//!
//! Cycles never overlap: a second call while one is running fails with
//! [`SyncError::SyncInProgress`]. Work inside a cycle is strictly sequential.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let coordinator = SyncCoordinator::new(&config, session, settings, replica, queue, bus);
//! let report = coordinator.run_cycle().await?;
//! println!("{} tracks added", report.tracks_new);
//! ```

use crate::error::{Result, SyncError};
use crate::fetcher::ContentFetcher;
use crate::history::HistoryFlusher;
use crate::pruner::ReplicaPruner;
use crate::reconciler::{ChangeKind, TrackReconciler};
use crate::remote::RemoteClient;
use crate::selection::PlaylistSelection;
use bridge_traits::{Clock, SettingsStore};
use chrono::{DateTime, Utc};
use core_auth::SessionManager;
use core_library::{
    HistoryRepository, PlaylistRepository, SqliteHistoryRepository, SqlitePlaylistRepository,
    SqliteTrackRepository, TrackRepository,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

pub const SYNC_LAST_SUCCESS_KEY: &str = "sync_last_success";

/// Summary of one finished cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub cycle_id: String,
    pub history_delivered: u64,
    pub tracks_new: u64,
    pub tracks_updated: u64,
    pub tracks_unchanged: u64,
    /// Changed tracks whose download failed; retried next cycle
    pub tracks_failed: u64,
    /// Catalog entries that did not decode
    pub entries_skipped: u64,
    pub tracks_pruned: u64,
    pub playlists_pruned: u64,
    pub catalog_complete: bool,
    pub duration_ms: u64,
}

/// Local view of the agent's state, gathered without network access
#[derive(Debug, Clone, PartialEq)]
pub struct SyncStatus {
    pub server_url: Option<String>,
    pub has_token: bool,
    pub selection: PlaylistSelection,
    pub last_success: Option<DateTime<Utc>>,
    pub tracks: i64,
    pub playlists: i64,
    pub pending_history: i64,
}

pub struct SyncCoordinator {
    session: Arc<SessionManager>,
    settings: Arc<dyn SettingsStore>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    playlists: Arc<dyn PlaylistRepository>,
    tracks: Arc<dyn TrackRepository>,
    history: Arc<dyn HistoryRepository>,
    flusher: HistoryFlusher,
    reconciler: TrackReconciler,
    fetcher: ContentFetcher,
    pruner: ReplicaPruner,
    running: Mutex<()>,
}

impl SyncCoordinator {
    /// Wire the sync components over the two local stores
    ///
    /// `replica` holds playlists, tracks and content; `queue` holds history.
    pub fn new(
        config: &CoreConfig,
        session: Arc<SessionManager>,
        settings: Arc<dyn SettingsStore>,
        replica: SqlitePool,
        queue: SqlitePool,
        event_bus: EventBus,
    ) -> Self {
        let playlists: Arc<dyn PlaylistRepository> =
            Arc::new(SqlitePlaylistRepository::new(replica.clone()));
        let tracks: Arc<dyn TrackRepository> = Arc::new(SqliteTrackRepository::new(replica));
        let history: Arc<dyn HistoryRepository> = Arc::new(SqliteHistoryRepository::new(queue));
        let remote = Arc::new(RemoteClient::from_config(config, session.clone()));

        Self {
            flusher: HistoryFlusher::new(
                remote.clone(),
                history.clone(),
                tracks.clone(),
                config.sync.scrobble_threshold_secs,
            ),
            reconciler: TrackReconciler::new(remote.clone(), playlists.clone(), tracks.clone())
                .with_max_pages(config.sync.max_catalog_pages)
                .with_force_resync(config.sync.force_resync),
            fetcher: ContentFetcher::new(remote, tracks.clone(), &config.sync),
            pruner: ReplicaPruner::new(playlists.clone(), tracks.clone()),
            session,
            settings,
            clock: config.clock.clone(),
            event_bus,
            playlists,
            tracks,
            history,
            running: Mutex::new(()),
        }
    }

    /// Run one complete cycle
    ///
    /// # Errors
    ///
    /// - [`SyncError::SyncInProgress`] if another cycle is running
    /// - fatal configuration errors (no server or credentials available)
    /// - any failure that survived re-authentication; nothing is pruned then
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> Result<SyncReport> {
        let _guard = self.running.try_lock().map_err(|_| {
            warn!("Sync requested while another cycle is running");
            SyncError::SyncInProgress
        })?;

        let cycle_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        info!(cycle_id = %cycle_id, "Starting sync");
        self.emit(SyncEvent::Started {
            cycle_id: cycle_id.clone(),
        });

        match self.execute(&cycle_id).await {
            Ok(mut report) => {
                report.duration_ms = started.elapsed().as_millis() as u64;
                info!(
                    cycle_id = %cycle_id,
                    history = report.history_delivered,
                    added = report.tracks_new,
                    updated = report.tracks_updated,
                    failed = report.tracks_failed,
                    pruned = report.tracks_pruned,
                    duration_ms = report.duration_ms,
                    "Sync completed"
                );
                self.emit(SyncEvent::Completed {
                    cycle_id,
                    tracks_added: report.tracks_new,
                    tracks_updated: report.tracks_updated,
                    tracks_failed: report.tracks_failed,
                    history_delivered: report.history_delivered,
                    duration_ms: report.duration_ms,
                });
                Ok(report)
            }
            Err(e) => {
                error!(cycle_id = %cycle_id, error = %e, fatal = e.is_fatal(), "Sync failed");
                self.emit(SyncEvent::Failed {
                    cycle_id,
                    message: e.to_string(),
                    recoverable: !e.is_fatal(),
                });
                Err(e)
            }
        }
    }

    async fn execute(&self, cycle_id: &str) -> Result<SyncReport> {
        let mut report = SyncReport {
            cycle_id: cycle_id.to_string(),
            ..SyncReport::default()
        };

        self.session.get_valid_token().await?;

        report.history_delivered = self.flusher.flush().await?;
        self.emit(SyncEvent::HistoryFlushed {
            cycle_id: cycle_id.to_string(),
            delivered: report.history_delivered,
        });

        let selection = PlaylistSelection::load(self.settings.as_ref()).await?;
        let reconciliation = self.reconciler.reconcile(&selection).await?;
        report.tracks_unchanged = reconciliation.unchanged;
        report.entries_skipped = reconciliation.malformed;
        report.catalog_complete = reconciliation.complete;
        self.emit(SyncEvent::CatalogFetched {
            cycle_id: cycle_id.to_string(),
            playlists: reconciliation.playlists.len() as u64,
            tracks_seen: reconciliation.seen_tracks.len() as u64,
            tracks_changed: reconciliation.changed.len() as u64,
            complete: reconciliation.complete,
        });

        for change in &reconciliation.changed {
            match self.fetcher.materialize(change).await {
                Ok(()) => {
                    match change.kind {
                        ChangeKind::New => report.tracks_new += 1,
                        ChangeKind::Stale => report.tracks_updated += 1,
                    }
                    self.emit(SyncEvent::TrackMaterialized {
                        cycle_id: cycle_id.to_string(),
                        path: change.track.path.clone(),
                        is_new: change.kind == ChangeKind::New,
                    });
                }
                Err(e) if e.is_item_local() => {
                    warn!(
                        path = %change.track.path,
                        error = %e,
                        "Skipping track, it will be retried next sync"
                    );
                    report.tracks_failed += 1;
                    self.emit(SyncEvent::TrackSkipped {
                        cycle_id: cycle_id.to_string(),
                        path: change.track.path.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        if reconciliation.complete {
            let outcome = self
                .pruner
                .prune(&reconciliation.seen_tracks, &reconciliation.playlists)
                .await?;
            report.tracks_pruned = outcome.tracks;
            report.playlists_pruned = outcome.playlists;
            self.emit(SyncEvent::Pruned {
                cycle_id: cycle_id.to_string(),
                tracks: outcome.tracks,
                playlists: outcome.playlists,
            });
        } else {
            warn!("Catalog was incomplete, not pruning local tracks");
        }

        self.settings
            .set_string(SYNC_LAST_SUCCESS_KEY, &self.clock.now().to_rfc3339())
            .await
            .map_err(SyncError::from_settings)?;

        Ok(report)
    }

    /// Local state summary; never touches the network
    pub async fn status(&self) -> Result<SyncStatus> {
        let token_store = self.session.token_store();
        let last_success = self
            .settings
            .get_string(SYNC_LAST_SUCCESS_KEY)
            .await
            .map_err(SyncError::from_settings)?
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|at| at.with_timezone(&Utc));

        Ok(SyncStatus {
            server_url: token_store.load_url().await?,
            has_token: token_store.has_token().await?,
            selection: PlaylistSelection::load(self.settings.as_ref()).await?,
            last_success,
            tracks: self.tracks.count().await?,
            playlists: self.playlists.count().await?,
            pending_history: self.history.count().await?,
        })
    }

    /// Replace the playlist selection used by later cycles
    pub async fn set_selection(&self, selection: &PlaylistSelection) -> Result<()> {
        selection.store(self.settings.as_ref()).await
    }

    pub fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }

    fn emit(&self, event: SyncEvent) {
        self.event_bus.emit(CoreEvent::Sync(event)).ok();
    }
}
