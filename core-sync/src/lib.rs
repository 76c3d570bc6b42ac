//! # Sync Engine
//!
//! Keeps a local replica of the selected playlists of a library server and
//! delivers plays recorded offline back to it.
//!
//! ## Components
//!
//! - [`RemoteClient`] - authenticated requests with one re-login retry
//! - [`TrackReconciler`] - catalog diff by path and version stamp
//! - [`ContentFetcher`] - content then metadata, one transaction per track
//! - [`ReplicaPruner`] - removes what the catalog no longer lists
//! - [`HistoryFlusher`] - ordered, acknowledged history delivery
//! - [`SyncCoordinator`] - runs the above as one cycle

pub mod catalog;
pub mod coordinator;
pub mod error;
pub mod fetcher;
pub mod history;
pub mod pruner;
pub mod reconciler;
pub mod remote;
pub mod selection;

pub use coordinator::{SyncCoordinator, SyncReport, SyncStatus, SYNC_LAST_SUCCESS_KEY};
pub use error::{Result, SyncError};
pub use fetcher::ContentFetcher;
pub use history::HistoryFlusher;
pub use pruner::{PruneOutcome, ReplicaPruner};
pub use reconciler::{ChangeKind, Reconciliation, TrackChange, TrackReconciler};
pub use remote::{HistoryPlayed, RemoteClient};
pub use selection::{PlaylistSelection, SYNC_PLAYLISTS_KEY};
