//! Linkscrub: tracking-parameter stripping for intercepted requests
//!
//! This crate decides, for every URL a browser is about to load, whether the
//! URL should pass unchanged, be rewritten without its tracking parameters,
//! be redirected to the destination hidden inside a tracking redirect, or be
//! blocked outright. The decisions are driven by a rule set of "providers"
//! assembled from remote, cached, bundled and user-supplied sources.

pub mod config;
pub mod output;
pub mod pattern;
pub mod provider;
pub mod rules;
pub mod state;
pub mod storage;
pub mod url;
pub mod whitelist;

use thiserror::Error;

/// Main error type for Linkscrub operations
#[derive(Debug, Error)]
pub enum ScrubError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Rule source error: {0}")]
    RuleSource(#[from] rules::RuleSourceError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Public suffix list error: {0}")]
    SuffixList(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Linkscrub operations
pub type Result<T> = std::result::Result<T, ScrubError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use pattern::{PatternCompiler, PublicSuffixList, SuffixResolver};
pub use provider::{Provider, ProviderList, RewriteOutcome, RuleEngine};
pub use rules::{HashStatus, MergeStats, MergedRuleSet, RuleSourceResolver};
pub use state::{AppState, InterceptRequest, InterceptResponse};
pub use whitelist::WhitelistMatcher;
