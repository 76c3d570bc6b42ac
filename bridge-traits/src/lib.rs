//! # Host Bridge Traits
//!
//! Capability traits the sync engine needs from its host.
//!
//! ## Overview
//!
//! The core crates never talk to the network, the terminal or the settings
//! database directly. Each capability is a trait defined here and implemented
//! per host: `bridge-desktop` ships the production implementations, tests ship
//! scripted ones.
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Single-attempt async HTTP with per-request timeouts
//!
//! ### Storage & Input
//! - [`SettingsStore`](storage::SettingsStore) - Key-value settings (server URL, token, selection)
//! - [`CredentialProvider`](credentials::CredentialProvider) - Server URL and login credentials on demand
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is
//! missing, see `core_runtime::config::CoreConfigBuilder::build`.
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should:
//!
//! - Report transport failures as `BridgeError::Network` so callers can tell
//!   them apart from server responses
//! - Report missing input capabilities as `BridgeError::NotAvailable`
//! - Include error context (URL, key, path)
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! behind `Arc` between the session manager and the sync engine.

pub mod credentials;
pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use credentials::{CredentialProvider, Credentials};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use storage::SettingsStore;
pub use time::{Clock, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
