//! Settings Storage Abstraction
//!
//! Key-value storage for the agent's persisted runtime settings (server URL,
//! session token, playlist selection, last successful sync).

use async_trait::async_trait;

use crate::error::Result;

/// Key-value settings storage trait
///
/// Every write must be durable when the call returns: the sync agent may be
/// terminated at any point and relies on the stored token and URL on the next
/// start.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SettingsStore;
///
/// async fn remember_server(store: &dyn SettingsStore) -> Result<()> {
///     store.set_string("sync_url", "https://music.example.com").await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Store a string value, replacing any previous value
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a string value
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Store an integer value
    async fn set_i64(&self, key: &str, value: i64) -> Result<()> {
        self.set_string(key, &value.to_string()).await
    }

    /// Retrieve an integer value
    ///
    /// Values that do not parse as integers are reported as missing.
    async fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        Ok(self
            .get_string(key)
            .await?
            .and_then(|value| value.parse().ok()))
    }

    /// Delete a setting. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a setting exists
    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.get_string(key).await?.is_some())
    }

    /// List all setting keys
    async fn list_keys(&self) -> Result<Vec<String>>;
}
