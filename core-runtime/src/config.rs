//! # Core Configuration Module
//!
//! Configuration for the offline sync agent.
//!
//! ## Overview
//!
//! A builder constructs a [`CoreConfig`] holding the injected host capabilities
//! and every tuning knob of a sync cycle. Validation is fail-fast: a missing
//! capability or an out-of-range value is reported from
//! [`CoreConfigBuilder::build`], before any network or database work starts.
//!
//! ## Capabilities
//!
//! - `HttpClient` - transport to the library server (desktop default: reqwest)
//! - `CredentialProvider` - server URL and login credentials (desktop default:
//!   terminal prompt)
//! - `Clock` - time source for sync bookkeeping (default: system clock)
//!
//! When the `desktop-shims` feature is enabled, the desktop implementations are
//! injected automatically if not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, SyncSettings};
//!
//! let config = CoreConfig::builder()
//!     .data_dir("/var/lib/music")
//!     .sync_settings(SyncSettings::default().with_force_resync(0.1))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{Clock, CredentialProvider, HttpClient, SystemClock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// File name of the replica store inside the data directory
pub const REPLICA_DB_FILE: &str = "offline.db";

/// File name of the queue/settings store inside the data directory
pub const QUEUE_DB_FILE: &str = "queue.db";

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Core configuration for the sync agent.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Directory holding both local stores
    pub data_dir: PathBuf,

    /// SQLite file of the replica store (playlists, tracks, content)
    pub replica_db_path: PathBuf,

    /// SQLite file of the queue store (settings, history)
    pub queue_db_path: PathBuf,

    /// Transport to the library server
    pub http_client: Arc<dyn HttpClient>,

    /// Source of the server URL and login credentials
    pub credential_provider: Arc<dyn CredentialProvider>,

    /// Time source
    pub clock: Arc<dyn Clock>,

    /// Timeout applied to every request
    pub request_timeout: Duration,

    /// Login retry policy
    pub auth: AuthSettings,

    /// Sync cycle tuning
    pub sync: SyncSettings,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("data_dir", &self.data_dir)
            .field("replica_db_path", &self.replica_db_path)
            .field("queue_db_path", &self.queue_db_path)
            .field("http_client", &"HttpClient { ... }")
            .field("credential_provider", &"CredentialProvider { ... }")
            .field("request_timeout", &self.request_timeout)
            .field("auth", &self.auth)
            .field("sync", &self.sync)
            .finish()
    }
}

/// Login retry policy.
///
/// Transport failures and rejected credentials are retried up to
/// `max_attempts` times. The delay before attempt `n` (1-based, `n > 1`) is
/// `backoff_base * 2^(n-2)`, capped at `backoff_max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthSettings {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_secs(10),
        }
    }
}

impl AuthSettings {
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_max = max;
        self
    }

    /// Delay to wait before the given 1-based attempt
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exponent = (attempt - 2).min(16);
        self.backoff_base
            .saturating_mul(1u32 << exponent)
            .min(self.backoff_max)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::Config(
                "Login max attempts must be at least 1".to_string(),
            ));
        }
        if self.backoff_base > self.backoff_max {
            return Err(Error::Config(
                "Login backoff base exceeds the backoff cap".to_string(),
            ));
        }
        Ok(())
    }
}

/// Tuning of a sync cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    /// Audio quality tier requested from `/get_track`
    pub audio_quality: String,

    /// Cover quality tier requested from `/get_album_cover`
    pub cover_quality: String,

    /// Tracks longer than this (in seconds) are eligible for scrobbling
    pub scrobble_threshold_secs: i64,

    /// Fraction (0.0 to 1.0) of unchanged tracks re-downloaded anyway
    pub force_resync: f64,

    /// Upper bound on `/track_list` pages followed in one cycle
    pub max_catalog_pages: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            audio_quality: "webm_opus_high".to_string(),
            cover_quality: "high".to_string(),
            scrobble_threshold_secs: 30,
            force_resync: 0.0,
            max_catalog_pages: 16,
        }
    }
}

impl SyncSettings {
    pub fn with_audio_quality(mut self, quality: impl Into<String>) -> Self {
        self.audio_quality = quality.into();
        self
    }

    pub fn with_cover_quality(mut self, quality: impl Into<String>) -> Self {
        self.cover_quality = quality.into();
        self
    }

    pub fn with_scrobble_threshold_secs(mut self, secs: i64) -> Self {
        self.scrobble_threshold_secs = secs;
        self
    }

    pub fn with_force_resync(mut self, ratio: f64) -> Self {
        self.force_resync = ratio;
        self
    }

    pub fn with_max_catalog_pages(mut self, pages: u32) -> Self {
        self.max_catalog_pages = pages;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.audio_quality.trim().is_empty() {
            return Err(Error::Config("Audio quality cannot be empty".to_string()));
        }
        if self.cover_quality.trim().is_empty() {
            return Err(Error::Config("Cover quality cannot be empty".to_string()));
        }
        if self.scrobble_threshold_secs < 0 {
            return Err(Error::Config(
                "Scrobble threshold cannot be negative".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.force_resync) {
            return Err(Error::Config(format!(
                "Force resync ratio must be between 0.0 and 1.0, got {}",
                self.force_resync
            )));
        }
        if self.max_catalog_pages == 0 {
            return Err(Error::Config(
                "At least one catalog page must be allowed".to_string(),
            ));
        }
        Ok(())
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(Error::Config("Data directory cannot be empty".to_string()));
        }

        if self.replica_db_path == self.queue_db_path {
            return Err(Error::Config(
                "Replica and queue stores must use different files".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeout must be greater than zero".to_string(),
            ));
        }

        self.auth.validate()?;
        self.sync.validate()?;

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required to reach the library server. \
                 Enable the 'desktop-shims' feature to use the default ReqwestHttpClient \
                 or inject an implementation."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn credential_provider_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "CredentialProvider".to_string(),
        message: "CredentialProvider implementation is required to log in. \
                 Enable the 'desktop-shims' feature to prompt on the terminal \
                 or inject a scripted provider."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::with_timeout(timeout)
        .map_err(|e| Error::Internal(format!("Failed to create default HttpClient: {}", e)))?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_credential_provider() -> Result<Arc<dyn CredentialProvider>> {
    use bridge_desktop::TerminalCredentialProvider;

    Ok(Arc::new(TerminalCredentialProvider::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_credential_provider() -> Result<Arc<dyn CredentialProvider>> {
    Err(credential_provider_missing_error())
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    data_dir: Option<PathBuf>,
    replica_db_path: Option<PathBuf>,
    queue_db_path: Option<PathBuf>,
    http_client: Option<Arc<dyn HttpClient>>,
    credential_provider: Option<Arc<dyn CredentialProvider>>,
    clock: Option<Arc<dyn Clock>>,
    request_timeout: Option<Duration>,
    auth: AuthSettings,
    sync: SyncSettings,
}

impl CoreConfigBuilder {
    /// Sets the data directory (required).
    ///
    /// Both stores default to files inside it: [`REPLICA_DB_FILE`] and
    /// [`QUEUE_DB_FILE`].
    pub fn data_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    /// Overrides the replica store location.
    pub fn replica_db_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.replica_db_path = Some(path.into());
        self
    }

    /// Overrides the queue store location.
    pub fn queue_db_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.queue_db_path = Some(path.into());
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not provided, the desktop default (reqwest-based) will be used when
    /// the `desktop-shims` feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the credential provider.
    ///
    /// If not provided, the terminal prompt will be used when the
    /// `desktop-shims` feature is enabled.
    pub fn credential_provider(mut self, provider: Arc<dyn CredentialProvider>) -> Self {
        self.credential_provider = Some(provider);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the per-request timeout. Default: 30 seconds
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn auth_settings(mut self, auth: AuthSettings) -> Self {
        self.auth = auth;
        self
    }

    pub fn sync_settings(mut self, sync: SyncSettings) -> Self {
        self.sync = sync;
        self
    }

    /// Shortcut for the force-resync ratio of [`SyncSettings`]
    pub fn force_resync(mut self, ratio: f64) -> Self {
        self.sync.force_resync = ratio;
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] when the data directory is missing or a value is
    ///   out of range
    /// - [`Error::CapabilityMissing`] when a capability is absent and no
    ///   desktop default is available
    pub fn build(self) -> Result<CoreConfig> {
        let data_dir = self.data_dir.ok_or_else(|| {
            Error::Config("Data directory is required. Use .data_dir() to set it.".to_string())
        })?;

        let request_timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(request_timeout)?,
        };

        let credential_provider = match self.credential_provider {
            Some(provider) => provider,
            None => provide_default_credential_provider()?,
        };

        let config = CoreConfig {
            replica_db_path: self
                .replica_db_path
                .unwrap_or_else(|| default_store_path(&data_dir, REPLICA_DB_FILE)),
            queue_db_path: self
                .queue_db_path
                .unwrap_or_else(|| default_store_path(&data_dir, QUEUE_DB_FILE)),
            data_dir,
            http_client,
            credential_provider,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            request_timeout,
            auth: self.auth,
            sync: self.sync,
        };

        config.validate()?;

        Ok(config)
    }
}

fn default_store_path(data_dir: &Path, file: &str) -> PathBuf {
    data_dir.join(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::{
        BridgeError, Credentials, HttpRequest, HttpResponse,
    };

    struct StubHttpClient;

    #[async_trait]
    impl HttpClient for StubHttpClient {
        async fn execute(
            &self,
            _request: HttpRequest,
        ) -> std::result::Result<HttpResponse, BridgeError> {
            Ok(HttpResponse::new(200, Vec::new()))
        }
    }

    struct StubCredentials;

    #[async_trait]
    impl CredentialProvider for StubCredentials {
        async fn server_url(&self) -> std::result::Result<String, BridgeError> {
            Ok("https://music.example.com".to_string())
        }

        async fn credentials(&self) -> std::result::Result<Credentials, BridgeError> {
            Ok(Credentials::new("alice", "secret"))
        }
    }

    fn builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .data_dir("/tmp/music")
            .http_client(Arc::new(StubHttpClient))
            .credential_provider(Arc::new(StubCredentials))
    }

    #[test]
    fn test_builder_requires_data_dir() {
        let result = CoreConfig::builder()
            .http_client(Arc::new(StubHttpClient))
            .credential_provider(Arc::new(StubCredentials))
            .build();

        match result {
            Err(Error::Config(msg)) => assert!(msg.contains("Data directory")),
            other => panic!("expected config error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_defaults() {
        let config = builder().build().unwrap();

        assert_eq!(config.replica_db_path, PathBuf::from("/tmp/music/offline.db"));
        assert_eq!(config.queue_db_path, PathBuf::from("/tmp/music/queue.db"));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.sync.audio_quality, "webm_opus_high");
        assert_eq!(config.sync.cover_quality, "high");
        assert_eq!(config.sync.scrobble_threshold_secs, 30);
        assert_eq!(config.sync.force_resync, 0.0);
        assert_eq!(config.sync.max_catalog_pages, 16);
        assert_eq!(config.auth.max_attempts, 3);
    }

    #[test]
    fn test_store_path_overrides() {
        let config = builder()
            .replica_db_path("/srv/replica.db")
            .queue_db_path("/srv/queue.db")
            .build()
            .unwrap();

        assert_eq!(config.replica_db_path, PathBuf::from("/srv/replica.db"));
        assert_eq!(config.queue_db_path, PathBuf::from("/srv/queue.db"));
    }

    #[test]
    fn test_rejects_shared_store_file() {
        let result = builder()
            .replica_db_path("/srv/one.db")
            .queue_db_path("/srv/one.db")
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_out_of_range_force_resync() {
        assert!(matches!(
            builder().force_resync(1.5).build(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            builder().force_resync(-0.1).build(),
            Err(Error::Config(_))
        ));
        assert!(builder().force_resync(1.0).build().is_ok());
    }

    #[test]
    fn test_rejects_zero_login_attempts() {
        let result = builder()
            .auth_settings(AuthSettings::default().with_max_attempts(0))
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let result = builder().request_timeout(Duration::ZERO).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_empty_quality() {
        let result = builder()
            .sync_settings(SyncSettings::default().with_audio_quality(" "))
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_backoff_schedule() {
        let auth = AuthSettings::default();

        assert_eq!(auth.delay_before(1), Duration::ZERO);
        assert_eq!(auth.delay_before(2), Duration::from_millis(500));
        assert_eq!(auth.delay_before(3), Duration::from_millis(1000));
        assert_eq!(auth.delay_before(4), Duration::from_millis(2000));
        assert_eq!(auth.delay_before(40), Duration::from_secs(10));
    }

    #[test]
    fn test_config_debug_hides_capabilities() {
        let config = builder().build().unwrap();
        let rendered = format!("{:?}", config);
        assert!(rendered.contains("HttpClient { ... }"));
        assert!(rendered.contains("/tmp/music"));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_missing_http_client_without_shims() {
        let result = CoreConfig::builder()
            .data_dir("/tmp/music")
            .credential_provider(Arc::new(StubCredentials))
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "HttpClient")
            }
            other => panic!("expected missing capability, got {:?}", other.map(|_| ())),
        }
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_build_with_desktop_defaults() {
        let config = CoreConfig::builder().data_dir("/tmp/music").build();
        assert!(config.is_ok());
    }
}
