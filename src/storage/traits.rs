//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::provider::LogEntry;
use crate::storage::{CounterRecord, RulesStatusRecord};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Rule documents are stored as raw JSON text; parsing them is left to the
/// caller so a malformed document never fails a load.
pub trait Storage {
    // ===== Rule Sources =====

    /// Loads the user's custom rule document
    fn load_custom_rules(&self) -> StorageResult<Option<String>>;

    /// Replaces the user's custom rule document
    fn save_custom_rules(&mut self, json: &str) -> StorageResult<()>;

    /// Loads the last verified remote rule set
    fn load_cached_rules(&self) -> StorageResult<Option<String>>;

    /// Replaces the cached remote rule set
    fn save_cached_rules(&mut self, json: &str) -> StorageResult<()>;

    /// Loads the identity keys of disabled providers
    fn load_disabled_signatures(&self) -> StorageResult<Vec<String>>;

    /// Replaces the identity keys of disabled providers
    fn save_disabled_signatures(&mut self, signatures: &[String]) -> StorageResult<()>;

    /// Loads the outcome of the last rule resolution
    fn load_rules_status(&self) -> StorageResult<Option<RulesStatusRecord>>;

    /// Records the outcome of a rule resolution
    fn save_rules_status(&mut self, record: &RulesStatusRecord) -> StorageResult<()>;

    // ===== Whitelist =====

    /// Loads the whitelist entries
    fn load_whitelist(&self) -> StorageResult<Vec<String>>;

    /// Replaces the whitelist entries
    fn save_whitelist(&mut self, entries: &[String]) -> StorageResult<()>;

    // ===== Log & Counters =====

    /// Replaces the persisted log with `entries`
    fn replace_log(&mut self, entries: &[LogEntry]) -> StorageResult<()>;

    /// Loads the persisted log, oldest first
    fn load_log(&self) -> StorageResult<Vec<LogEntry>>;

    /// Loads the counters; missing counters are zero
    fn load_counters(&self) -> StorageResult<CounterRecord>;

    /// Replaces the counters
    fn save_counters(&mut self, counters: &CounterRecord) -> StorageResult<()>;
}
