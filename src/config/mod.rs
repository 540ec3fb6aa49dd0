//! Configuration management for dispatchbox
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use dispatchbox::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Probes listening on: {}", config.probes.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `DISPATCHBOX__<section>__<key>`
//!
//! Examples:
//! - `DISPATCHBOX__BROKER__MAX_CONSUMERS=32`
//! - `DISPATCHBOX__QUEUES__ROUTING_NAMESPACE=provider`
//! - `DISPATCHBOX__PROBES__BIND_ADDR=0.0.0.0:9000`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/dispatchbox.toml`.
//! This can be overridden using the `DISPATCHBOX_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use models::{
    BrokerConfig, Config, DeadLetterConfig, ProbesConfig, QueuesConfig, ServiceConfig,
    SourcesConfig,
};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`DISPATCHBOX__*`)
    /// 2. TOML file (default: `config/dispatchbox.toml`)
    /// 3. Default values
    ///
    /// # Errors
    ///
    /// Returns an error if the file is malformed or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// Environment overrides still apply.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Explicit path when given, the usual lookup otherwise
    pub fn load_with(path: Option<std::path::PathBuf>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }
}
