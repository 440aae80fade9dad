//! Shared support for the dose-calc tools
//!
//! Provides the pieces every binary needs around the evaluator:
//! - layered configuration (defaults, file, environment)
//! - logging setup
//! - the error type for both

pub mod config;
pub mod error;
pub mod logging;

pub use config::{DosecalcConfig, LoggingConfig, CONFIG_ENV_PREFIX, DEFAULT_CONFIG_PATH};
pub use error::{Error, Result};
pub use logging::LogConfig;

// Re-export common dependencies
pub use serde;
pub use serde_json;
