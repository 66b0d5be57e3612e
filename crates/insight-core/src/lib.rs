//! Insight Core - Foundation crate for the Insight page-analysis client.
//!
//! This crate provides the shared error type and the configuration layer that
//! the API client and the command-line tool both depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths and env overrides
//!
//! # Example
//!
//! ```rust
//! use insight_core::{AppConfig, RotationMode};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! config.validate()?;
//!
//! assert_eq!(config.api.key_rotation, RotationMode::RoundRobin);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{
    AnalysisConfig, ApiConfig, AppConfig, BatchConfig, RotationMode, DEFAULT_ENDPOINT,
};
pub use error::{ConfigError, ConfigResult, InsightError, Result};
