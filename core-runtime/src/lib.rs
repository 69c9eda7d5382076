//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the resource engine:
//! - Logging and tracing infrastructure
//! - Engine configuration with fail-fast validation
//! - Event bus carrying folder and resolution notifications
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the engine crates depend on.
//! It establishes the logging conventions, the injected capabilities (worker
//! count, folder watcher) and the typed events that replace ad-hoc callbacks
//! between the folder models and their observers.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
