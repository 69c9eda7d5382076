//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (`core-sync`, `core-metadata`, `core-runtime`). Host
//! applications can depend on `resource-engine-workspace` and enable the
//! documented features without wiring each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_metadata as metadata;
#[cfg(feature = "desktop-shims")]
pub use core_runtime as runtime;
#[cfg(feature = "desktop-shims")]
pub use core_sync as sync;
