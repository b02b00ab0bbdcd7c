//! Configuration module for Linkscrub
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use linkscrub::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("linkscrub.toml")).unwrap();
//! println!("Remote sources: {}", config.rules.remote.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, EngineConfig, LogConfig, RemoteSource, RulesConfig, StorageConfig, SuffixConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};

pub use validation::{validate_remote_source, validate_whitelist_entry};

/// Hard ceiling on the number of retained log entries, whatever the configured limit.
pub const HARD_LOG_CEILING: usize = 5_000;
