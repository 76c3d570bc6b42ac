use bridge_traits::BridgeError;
use core_auth::{is_session_status, AuthError};
use core_library::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// Missing or invalid configuration. Fatal for the process.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error on {endpoint}: {message}")]
    Network { endpoint: String, message: String },

    #[error("Server returned {status} for {endpoint}")]
    Server { status: u16, endpoint: String },

    /// Malformed server payload
    #[error("Data error: {0}")]
    Data(String),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Local store error: {0}")]
    Library(#[from] LibraryError),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("A sync cycle is already in progress")]
    SyncInProgress,
}

impl SyncError {
    /// Errors that need operator action; retrying later will not help
    pub fn is_fatal(&self) -> bool {
        match self {
            SyncError::Config(_) => true,
            SyncError::Auth(e) => e.is_fatal(),
            _ => false,
        }
    }

    /// The server refused the session token
    pub fn is_session_error(&self) -> bool {
        match self {
            SyncError::Server { status, .. } => is_session_status(*status),
            SyncError::Auth(e) => e.is_session_error(),
            _ => false,
        }
    }

    /// Failures confined to a single remote resource
    ///
    /// A track whose download fails this way is skipped and retried on the
    /// next cycle. Everything else aborts the cycle.
    pub fn is_item_local(&self) -> bool {
        match self {
            SyncError::Network { .. } | SyncError::Data(_) => true,
            SyncError::Server { status, .. } => !is_session_status(*status),
            // The store refused this one track; its transaction was rolled back.
            SyncError::Library(LibraryError::InvalidInput { .. }) => true,
            _ => false,
        }
    }

    pub(crate) fn from_transport(endpoint: &str, error: BridgeError) -> Self {
        SyncError::Network {
            endpoint: endpoint.to_string(),
            message: match error {
                BridgeError::Network(msg) => msg,
                other => other.to_string(),
            },
        }
    }

    pub(crate) fn from_settings(error: BridgeError) -> Self {
        SyncError::Settings(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
