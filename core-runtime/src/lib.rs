//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the sync agent crates:
//! - Logging and tracing setup
//! - Configuration with fail-fast validation
//! - Event bus for session and sync progress
//!
//! Every other `core-*` crate depends on this one for its configuration types
//! and event definitions.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
