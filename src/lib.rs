//! Offline sync agent façade and bootstrap helpers.
//!
//! Wires the desktop bridges, the two local stores and the session into a
//! ready [`SyncCoordinator`]. The binary in `main.rs` is a thin CLI over
//! [`OfflineSync`]; hosts embedding the agent call [`bootstrap`] directly.

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_desktop::SqliteSettingsStore;
use bridge_traits::SettingsStore;
use core_auth::SessionManager;
use core_library::{create_queue_pool, create_replica_pool, DatabaseConfig};
use core_runtime::config::CoreConfig;
use core_runtime::events::EventBus;
use core_sync::{PlaylistSelection, SyncCoordinator, SyncReport, SyncStatus};
use tracing::{debug, info};

/// Primary façade exposed to the CLI and embedding hosts.
pub struct OfflineSync {
    coordinator: SyncCoordinator,
    event_bus: EventBus,
}

impl OfflineSync {
    /// Subscribe to sync and auth events of this agent
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn coordinator(&self) -> &SyncCoordinator {
        &self.coordinator
    }

    /// Run one sync cycle
    pub async fn sync(&self) -> Result<SyncReport> {
        Ok(self.coordinator.run_cycle().await?)
    }

    /// Replace the playlist selection; does not start a cycle
    pub async fn select_playlists(&self, selection: &PlaylistSelection) -> Result<()> {
        self.coordinator.set_selection(selection).await?;
        info!(selection = %selection, "Playlist selection updated");
        Ok(())
    }

    pub async fn status(&self) -> Result<SyncStatus> {
        Ok(self.coordinator.status().await?)
    }
}

/// Open both stores under the configured data directory and wire the agent
///
/// # Errors
///
/// - [`CoreError::InitializationFailed`] when the data directory or the
///   settings store cannot be prepared
/// - [`CoreError::Library`] when a store cannot be opened or migrated
pub async fn bootstrap(config: CoreConfig) -> Result<OfflineSync> {
    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .map_err(|e| {
            CoreError::InitializationFailed(format!(
                "cannot create data directory {}: {}",
                config.data_dir.display(),
                e
            ))
        })?;

    let replica = create_replica_pool(DatabaseConfig::new(&config.replica_db_path)).await?;
    let queue = create_queue_pool(DatabaseConfig::new(&config.queue_db_path)).await?;
    debug!(
        replica = %config.replica_db_path.display(),
        queue = %config.queue_db_path.display(),
        "Local stores ready"
    );

    let settings: Arc<dyn SettingsStore> = Arc::new(
        SqliteSettingsStore::new(queue.clone())
            .await
            .map_err(|e| CoreError::InitializationFailed(e.to_string()))?,
    );

    let event_bus = EventBus::default();
    let session = Arc::new(SessionManager::from_config(
        &config,
        settings.clone(),
        event_bus.clone(),
    ));
    let coordinator =
        SyncCoordinator::new(&config, session, settings, replica, queue, event_bus.clone());

    Ok(OfflineSync {
        coordinator,
        event_bus,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{
        BridgeError, CredentialProvider, Credentials, HttpClient, HttpRequest, HttpResponse,
    };

    struct Offline;

    #[async_trait]
    impl HttpClient for Offline {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            Err(BridgeError::Network("offline".to_string()))
        }
    }

    #[async_trait]
    impl CredentialProvider for Offline {
        async fn server_url(&self) -> BridgeResult<String> {
            Err(BridgeError::NotAvailable("no terminal".to_string()))
        }

        async fn credentials(&self) -> BridgeResult<Credentials> {
            Err(BridgeError::NotAvailable("no terminal".to_string()))
        }
    }

    fn config(dir: &std::path::Path) -> CoreConfig {
        CoreConfig::builder()
            .data_dir(dir.join("music"))
            .http_client(Arc::new(Offline))
            .credential_provider(Arc::new(Offline))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_bootstrap_creates_stores() {
        let dir = tempfile::tempdir().unwrap();
        let agent = bootstrap(config(dir.path())).await.unwrap();

        assert!(dir.path().join("music").join("offline.db").exists());
        assert!(dir.path().join("music").join("queue.db").exists());

        let status = agent.status().await.unwrap();
        assert!(status.server_url.is_none());
        assert_eq!(status.tracks, 0);
        assert_eq!(status.pending_history, 0);
    }

    #[tokio::test]
    async fn test_selection_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let agent = bootstrap(config(dir.path())).await.unwrap();
        agent
            .select_playlists(&PlaylistSelection::parse("Rock,Jazz").unwrap())
            .await
            .unwrap();
        drop(agent);

        let agent = bootstrap(config(dir.path())).await.unwrap();
        let status = agent.status().await.unwrap();
        assert!(status.selection.includes("Jazz", false));
        assert!(!status.selection.includes("Pop", true));
    }

    #[tokio::test]
    async fn test_sync_without_terminal_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let agent = bootstrap(config(dir.path())).await.unwrap();

        let error = agent.sync().await.unwrap_err();
        assert!(error.is_fatal());
    }
}
