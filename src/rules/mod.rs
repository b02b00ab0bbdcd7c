//! Rule acquisition and merging
//!
//! Rule sets come from four tiers, tried in order until one yields
//! providers: verified remote sources, the cache of the last verified
//! remote result, the bundled rule file and a small built-in emergency set.
//! Whatever tier wins is merged with the user's custom rules.

mod fallback;
mod fetcher;
mod merge;
mod resolver;
mod verify;

pub use fallback::emergency_rules;
pub use fetcher::{build_http_client, HttpFetcher, RuleFetcher};
pub use merge::{parse_disabled_signatures, MergeStats, ProviderMerger};
pub use resolver::{fetch_source, ResolvedRules, RuleSourceResolver, SourceFailure};
pub use verify::{content_hash, parse_hash_document, sha256_hex, verify_rules, VerificationResult};

use crate::ConfigError;
use thiserror::Error;

/// The rule document a resolution cycle produces
pub type MergedRuleSet = crate::provider::RuleFile;

/// Errors raised while acquiring a rule source
#[derive(Debug, Error)]
pub enum RuleSourceError {
    #[error("Invalid remote source: {0}")]
    InvalidSource(#[from] ConfigError),

    #[error("Hash mismatch: expected {expected}, computed {computed}")]
    HashMismatch { expected: String, computed: String },

    #[error("Invalid hash document: {0}")]
    InvalidHashFormat(String),

    #[error("HTTP {status} from {url}")]
    Http { url: String, status: u16 },

    #[error("Request to {0} timed out")]
    Timeout(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Rule document from {0} has no providers")]
    Empty(String),
}

/// Which path produced the active rule set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashStatus {
    /// Every configured remote source verified
    RemoteVerified,
    /// Some remote sources verified, others failed
    RemotePartial,
    /// Remote sources failed; the cached verified result was used
    Cache,
    /// Remote rules are disabled or unconfigured; the bundled file was used
    Bundled,
    /// Remote sources and cache failed; the bundled file was used
    BundledAfterRemoteFailure,
    /// Nothing else was usable; the built-in emergency rules were used
    EmergencyFallback,
    /// Built-in rules are disabled; only custom rules are active
    CustomOnly,
}

impl HashStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::RemoteVerified => "remote_verified",
            Self::RemotePartial => "remote_partial",
            Self::Cache => "cache",
            Self::Bundled => "bundled",
            Self::BundledAfterRemoteFailure => "bundled_after_remote_failure",
            Self::EmergencyFallback => "emergency_fallback",
            Self::CustomOnly => "custom_only",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "remote_verified" => Some(Self::RemoteVerified),
            "remote_partial" => Some(Self::RemotePartial),
            "cache" => Some(Self::Cache),
            "bundled" => Some(Self::Bundled),
            "bundled_after_remote_failure" => Some(Self::BundledAfterRemoteFailure),
            "emergency_fallback" => Some(Self::EmergencyFallback),
            "custom_only" => Some(Self::CustomOnly),
            _ => None,
        }
    }
}

impl std::fmt::Display for HashStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_db_string())
    }
}
