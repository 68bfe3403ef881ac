//! Shared library for anime-hub.
//!
//! This crate provides common functionality used by the anime-hub crates:
//! - Configuration management
//! - Canonical media data model
//! - Logging infrastructure

pub mod config;
pub mod logging;
pub mod models;

// Re-export commonly used types
pub use config::Config;
pub use logging::LogConfig;
pub use models::*;

/// Common result type using anyhow::Error
pub type Result<T> = anyhow::Result<T>;
