//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop hosts
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest` (rustls, 30 second timeout, no retries)
//! - `SettingsStore` using a SQLite-backed key-value table
//! - `CredentialProvider` prompting on the terminal, or reading environment
//!   variables for unattended runs
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, TerminalCredentialProvider};
//!
//! let http_client = ReqwestHttpClient::new()?;
//! let prompt = TerminalCredentialProvider::new();
//! // Use in core configuration
//! ```

mod http;
mod prompt;
mod settings;

pub use http::{ReqwestHttpClient, DEFAULT_TIMEOUT, USER_AGENT};
pub use prompt::{
    EnvCredentialProvider, TerminalCredentialProvider, ENV_PASSWORD, ENV_SERVER_URL,
    ENV_USERNAME,
};
pub use settings::SqliteSettingsStore;
