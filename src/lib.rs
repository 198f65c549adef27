//! Workspace entry crate.
//!
//! Exposes the feature flags that map onto the individual workspace crates.
//! Host applications can depend on `cache-autoupdate-workspace` and enable
//! `desktop-shims` without wiring each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service::{AutoUpdateDependencies, AutoUpdateService, CoreError};
