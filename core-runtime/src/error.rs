use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Errors the operator has to fix before the agent can run at all
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_) | Error::CapabilityMissing { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
