//! Session Persistence
//!
//! The server URL and session token live in the settings store under
//! `sync_url` and `sync_token`, so a restarted agent resumes without a prompt.
//!
//! ## Example
//!
//! ```no_run
//! use core_auth::{AuthToken, TokenStore};
//! use std::sync::Arc;
//! # use bridge_traits::storage::SettingsStore;
//! # async fn example(settings: Arc<dyn SettingsStore>) -> core_auth::Result<()> {
//! let store = TokenStore::new(settings);
//!
//! store.store_token(&AuthToken::new("abc")).await?;
//! assert!(store.load_token().await?.is_some());
//! store.clear_token().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::{AuthToken, SYNC_TOKEN_KEY, SYNC_URL_KEY};
use bridge_traits::storage::SettingsStore;
use core_runtime::logging::redact_if_sensitive;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Reads and writes the persisted session.
///
/// Token values are never logged raw.
#[derive(Clone)]
pub struct TokenStore {
    settings: Arc<dyn SettingsStore>,
}

impl TokenStore {
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self { settings }
    }

    async fn read(&self, key: &str) -> Result<Option<String>> {
        let value = self.settings.get_string(key).await.map_err(|e| {
            warn!(key = key, error = %e, "Failed to read session setting");
            AuthError::Storage(e.to_string())
        })?;

        // An empty value is as good as none.
        Ok(value.filter(|v| !v.trim().is_empty()))
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        self.settings.set_string(key, value).await.map_err(|e| {
            warn!(key = key, error = %e, "Failed to write session setting");
            AuthError::Storage(e.to_string())
        })
    }

    /// Stored server base URL
    pub async fn load_url(&self) -> Result<Option<String>> {
        self.read(SYNC_URL_KEY).await
    }

    pub async fn store_url(&self, url: &str) -> Result<()> {
        self.write(SYNC_URL_KEY, url).await?;
        info!(url = url, "Stored sync server URL");
        Ok(())
    }

    /// Stored session token
    pub async fn load_token(&self) -> Result<Option<AuthToken>> {
        Ok(self.read(SYNC_TOKEN_KEY).await?.map(AuthToken::new))
    }

    /// Persist a token, replacing any previous one
    pub async fn store_token(&self, token: &AuthToken) -> Result<()> {
        self.write(SYNC_TOKEN_KEY, token.as_str()).await?;
        debug!(
            sync_token = %redact_if_sensitive(SYNC_TOKEN_KEY, token.as_str()),
            "Stored session token"
        );
        Ok(())
    }

    /// Forget the stored token. Missing tokens are not an error.
    pub async fn clear_token(&self) -> Result<()> {
        self.settings.delete(SYNC_TOKEN_KEY).await.map_err(|e| {
            warn!(error = %e, "Failed to delete session token");
            AuthError::Storage(e.to_string())
        })?;
        debug!("Cleared session token");
        Ok(())
    }

    pub async fn has_token(&self) -> Result<bool> {
        Ok(self.load_token().await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::SqliteSettingsStore;

    async fn store() -> (TokenStore, Arc<dyn SettingsStore>) {
        let settings: Arc<dyn SettingsStore> =
            Arc::new(SqliteSettingsStore::in_memory().await.unwrap());
        (TokenStore::new(settings.clone()), settings)
    }

    #[tokio::test]
    async fn test_token_round_trip_uses_sync_token_key() {
        let (tokens, settings) = store().await;

        assert!(!tokens.has_token().await.unwrap());
        tokens.store_token(&AuthToken::new("abc")).await.unwrap();

        assert_eq!(
            tokens.load_token().await.unwrap(),
            Some(AuthToken::new("abc"))
        );
        assert_eq!(
            settings.get_string("sync_token").await.unwrap(),
            Some("abc".to_string())
        );
    }

    #[tokio::test]
    async fn test_clear_token_keeps_url() {
        let (tokens, _) = store().await;

        tokens.store_url("https://music.example.com").await.unwrap();
        tokens.store_token(&AuthToken::new("abc")).await.unwrap();
        tokens.clear_token().await.unwrap();
        tokens.clear_token().await.unwrap();

        assert!(tokens.load_token().await.unwrap().is_none());
        assert_eq!(
            tokens.load_url().await.unwrap(),
            Some("https://music.example.com".to_string())
        );
    }

    #[tokio::test]
    async fn test_blank_values_are_missing() {
        let (tokens, settings) = store().await;

        settings.set_string("sync_token", "  ").await.unwrap();
        settings.set_string("sync_url", "").await.unwrap();

        assert!(tokens.load_token().await.unwrap().is_none());
        assert!(tokens.load_url().await.unwrap().is_none());
    }
}
