//! Integrity checks for remote rule documents

use crate::provider::RuleFile;
use crate::rules::RuleSourceError;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Accepted length range of a hex hash document
const HASH_HEX_LEN: std::ops::RangeInclusive<usize> = 32..=128;

/// Outcome of checking one fetched rule document against its hash
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub computed_hash: String,
    pub expected_hash: String,
    pub verified: bool,
    pub timestamp: DateTime<Utc>,
    pub error: Option<String>,
}

impl VerificationResult {
    /// Converts a failed verification into an error
    pub fn into_result(self) -> Result<(), RuleSourceError> {
        if self.verified {
            return Ok(());
        }
        if self.expected_hash.is_empty() {
            return Err(RuleSourceError::InvalidHashFormat(
                self.error.unwrap_or_default(),
            ));
        }
        Err(RuleSourceError::HashMismatch {
            expected: self.expected_hash,
            computed: self.computed_hash,
        })
    }
}

/// Lowercase hex SHA-256 of `bytes`
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Extracts the hash from a hash document
///
/// The first whitespace-separated token is used, so `sha256sum` output is
/// accepted as well as a bare digest.
///
/// # Examples
///
/// ```
/// use linkscrub::rules::parse_hash_document;
///
/// let hash = "AB".repeat(32);
/// assert_eq!(parse_hash_document(&format!("{}  rules.json\n", hash)).unwrap(), hash.to_lowercase());
/// assert!(parse_hash_document("not-hex").is_err());
/// ```
pub fn parse_hash_document(text: &str) -> Result<String, RuleSourceError> {
    let token = text.split_whitespace().next().unwrap_or_default();

    if !HASH_HEX_LEN.contains(&token.len()) {
        return Err(RuleSourceError::InvalidHashFormat(format!(
            "expected {} to {} hex characters, got {}",
            HASH_HEX_LEN.start(),
            HASH_HEX_LEN.end(),
            token.len()
        )));
    }
    if !token.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(RuleSourceError::InvalidHashFormat(
            "hash contains non-hex characters".to_string(),
        ));
    }

    Ok(token.to_ascii_lowercase())
}

/// Verifies raw rule bytes against a hash document
///
/// Only exact equality with the SHA-256 of the bytes counts as verified.
pub fn verify_rules(bytes: &[u8], hash_document: &str) -> VerificationResult {
    let computed_hash = sha256_hex(bytes);
    let timestamp = Utc::now();

    match parse_hash_document(hash_document) {
        Ok(expected_hash) => {
            let verified = expected_hash == computed_hash;
            VerificationResult {
                error: (!verified).then(|| "hash mismatch".to_string()),
                computed_hash,
                expected_hash,
                verified,
                timestamp,
            }
        }
        Err(e) => VerificationResult {
            computed_hash,
            expected_hash: String::new(),
            verified: false,
            timestamp,
            error: Some(e.to_string()),
        },
    }
}

/// SHA-256 over a key-sorted JSON serialization of a rule set
pub fn content_hash(rules: &RuleFile) -> Result<String, serde_json::Error> {
    let value = canonicalize(serde_json::to_value(rules)?);
    Ok(sha256_hex(serde_json::to_string(&value)?.as_bytes()))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
