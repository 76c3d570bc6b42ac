//! Which remote playlists are replicated
//!
//! Stored under `sync_playlists` as a JSON array of names. Without the
//! setting every favorited playlist is replicated.

use crate::error::{Result, SyncError};
use bridge_traits::SettingsStore;
use std::collections::BTreeSet;
use std::fmt;
use tracing::{info, warn};

pub const SYNC_PLAYLISTS_KEY: &str = "sync_playlists";

/// Command-line spelling of the default selection
pub const FAVORITES: &str = "favorite";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PlaylistSelection {
    /// Every playlist the user marked as favorite
    #[default]
    Favorites,
    /// Exactly these playlists, favorite or not
    Named(BTreeSet<String>),
}

impl PlaylistSelection {
    /// Parse `favorite` or a comma separated list of names
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.eq_ignore_ascii_case(FAVORITES) {
            return Ok(Self::Favorites);
        }

        let names: BTreeSet<String> = input
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();

        if names.is_empty() {
            return Err(SyncError::Config(format!(
                "expected '{}' or a comma separated list of playlist names",
                FAVORITES
            )));
        }
        Ok(Self::Named(names))
    }

    /// Whether a remote playlist is replicated
    pub fn includes(&self, name: &str, favorite: bool) -> bool {
        match self {
            Self::Favorites => favorite,
            Self::Named(names) => names.contains(name),
        }
    }

    /// Load the stored selection
    ///
    /// An unreadable value falls back to favorites with a warning.
    pub async fn load(settings: &dyn SettingsStore) -> Result<Self> {
        let stored = settings
            .get_string(SYNC_PLAYLISTS_KEY)
            .await
            .map_err(SyncError::from_settings)?;

        let Some(raw) = stored else {
            return Ok(Self::Favorites);
        };

        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(names) if !names.is_empty() => Ok(Self::Named(names.into_iter().collect())),
            Ok(_) => Ok(Self::Favorites),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable playlist selection");
                Ok(Self::Favorites)
            }
        }
    }

    /// Persist the selection; favorites clears the setting
    pub async fn store(&self, settings: &dyn SettingsStore) -> Result<()> {
        match self {
            Self::Favorites => settings
                .delete(SYNC_PLAYLISTS_KEY)
                .await
                .map_err(SyncError::from_settings)?,
            Self::Named(names) => {
                let encoded = serde_json::to_string(names)
                    .map_err(|e| SyncError::Data(e.to_string()))?;
                settings
                    .set_string(SYNC_PLAYLISTS_KEY, &encoded)
                    .await
                    .map_err(SyncError::from_settings)?;
            }
        }
        info!(selection = %self, "Playlist selection changed");
        Ok(())
    }
}

impl fmt::Display for PlaylistSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Favorites => f.write_str("favorite playlists"),
            Self::Named(names) => {
                let names: Vec<&str> = names.iter().map(String::as_str).collect();
                f.write_str(&names.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::SqliteSettingsStore;

    #[test]
    fn test_parse() {
        assert_eq!(
            PlaylistSelection::parse("favorite").unwrap(),
            PlaylistSelection::Favorites
        );
        assert_eq!(
            PlaylistSelection::parse(" Rock , Jazz,,").unwrap(),
            PlaylistSelection::Named(["Jazz", "Rock"].into_iter().map(String::from).collect())
        );
        assert!(PlaylistSelection::parse(" , ").is_err());
    }

    #[test]
    fn test_includes() {
        assert!(PlaylistSelection::Favorites.includes("Rock", true));
        assert!(!PlaylistSelection::Favorites.includes("Rock", false));

        let named = PlaylistSelection::parse("Rock").unwrap();
        assert!(named.includes("Rock", false));
        assert!(!named.includes("Jazz", true));
    }

    #[tokio::test]
    async fn test_store_and_load() {
        let settings = SqliteSettingsStore::in_memory().await.unwrap();
        assert_eq!(
            PlaylistSelection::load(&settings).await.unwrap(),
            PlaylistSelection::Favorites
        );

        let named = PlaylistSelection::parse("Rock,Jazz").unwrap();
        named.store(&settings).await.unwrap();
        assert_eq!(PlaylistSelection::load(&settings).await.unwrap(), named);

        PlaylistSelection::Favorites.store(&settings).await.unwrap();
        assert!(settings.get_string(SYNC_PLAYLISTS_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_garbage_falls_back_to_favorites() {
        let settings = SqliteSettingsStore::in_memory().await.unwrap();
        settings
            .set_string(SYNC_PLAYLISTS_KEY, "not json")
            .await
            .unwrap();

        assert_eq!(
            PlaylistSelection::load(&settings).await.unwrap(),
            PlaylistSelection::Favorites
        );
    }
}
