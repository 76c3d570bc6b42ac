use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    /// No server URL or credentials can be obtained. Fatal for the process.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server returned {status} for {endpoint}")]
    Server { status: u16, endpoint: String },

    #[error("Login failed after {attempts} attempt(s): {last}")]
    LoginFailed { attempts: u32, last: String },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    #[error("Settings storage error: {0}")]
    Storage(String),
}

impl AuthError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, AuthError::Config(_))
    }

    /// Statuses the server uses to refuse a session token
    pub fn is_session_error(&self) -> bool {
        matches!(self, AuthError::Server { status, .. } if is_session_status(*status))
    }

    /// Map a transport-level bridge error
    pub(crate) fn from_transport(error: BridgeError) -> Self {
        match error {
            BridgeError::Network(msg) => AuthError::Network(msg),
            other => AuthError::Network(other.to_string()),
        }
    }
}

/// 401 and 403 mean the session token is no longer accepted
pub fn is_session_status(status: u16) -> bool {
    status == 401 || status == 403
}

pub type Result<T> = std::result::Result<T, AuthError>;
