//! Parsing and validation of `kiln.toml` build configuration files.
//!
//! This crate reads the build configuration and produces a strongly-typed
//! [`BuildConfig`]. The build core only consumes one thing from it for
//! invalidation: the [`BuildConfig::fingerprint`] hash of every setting that
//! affects generated artifacts.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, validate_config, CONFIG_FILE};
pub use types::*;
