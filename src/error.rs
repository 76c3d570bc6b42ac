use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Authentication error: {0}")]
    Auth(#[from] core_auth::AuthError),

    #[error("Sync error: {0}")]
    Sync(#[from] core_sync::SyncError),

    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),
}

impl CoreError {
    /// Errors that re-running later will not fix
    pub fn is_fatal(&self) -> bool {
        match self {
            CoreError::InitializationFailed(_) => true,
            CoreError::Config(e) => e.is_fatal(),
            CoreError::Auth(e) => e.is_fatal(),
            CoreError::Sync(e) => e.is_fatal(),
            CoreError::Library(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let config = CoreError::from(core_runtime::Error::Config("no data dir".to_string()));
        assert!(config.is_fatal());

        let prompt = CoreError::from(core_sync::SyncError::Auth(core_auth::AuthError::Config(
            "stdin is not a terminal".to_string(),
        )));
        assert!(prompt.is_fatal());

        let busy = CoreError::from(core_sync::SyncError::SyncInProgress);
        assert!(!busy.is_fatal());

        let network = CoreError::from(core_auth::AuthError::Network("refused".to_string()));
        assert!(!network.is_fatal());
    }
}
