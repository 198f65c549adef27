//! # Core Runtime Module
//!
//! Foundational infrastructure shared by the auto-update crates:
//! - Logging and tracing infrastructure
//! - Configuration management and capability checks
//! - Event bus system
//! - On-disk cache layout
//!
//! The runtime itself is plain tokio; nothing here spawns tasks except the
//! logger sink forwarding in [`logging`].

pub mod config;
pub mod error;
pub mod events;
pub mod layout;
pub mod logging;

pub use error::{Error, Result};
