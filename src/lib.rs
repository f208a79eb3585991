//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the
//! individual workspace crates (e.g., `core-service`). Host applications
//! can depend on `cumulus-workspace` with the default `desktop` feature and
//! get the fully wired client facade without naming each crate.

#[cfg(feature = "desktop")]
pub use core_service::*;
