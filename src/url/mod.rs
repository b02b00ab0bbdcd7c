//! URL handling module for Linkscrub
//!
//! This module provides host extraction, local-network detection,
//! whitelist-entry matching, and the URL splitting/decoding helpers used by
//! the rewrite engine.

mod domain;
mod matcher;
mod normalize;

// Re-export main functions
pub use domain::{extract_host, is_local_host, parse_web_url};
pub use matcher::matches_whitelist_entry;
pub use normalize::{decode_until_stable, ensure_scheme, param_key, UrlParts};
