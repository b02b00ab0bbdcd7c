//! Storage module for persisting rule and session data
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Custom rules, cached remote rules and the disabled-provider list
//! - The whitelist
//! - The rewrite log and counters
//! - The status record of the last rule resolution

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::rules::HashStatus;
use crate::ScrubError;

use std::path::Path;
use std::sync::{Arc, Mutex};

/// Storage shared between the resolver, the log flusher and the CLI
pub type SharedStorage = Arc<Mutex<dyn Storage + Send>>;

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> Result<SqliteStorage, ScrubError> {
    SqliteStorage::new(path)
}

/// Wraps a storage backend for sharing
pub fn shared<S: Storage + Send + 'static>(storage: S) -> SharedStorage {
    Arc::new(Mutex::new(storage))
}

/// Outcome of the last rule resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RulesStatusRecord {
    /// SHA-256 of the merged rule set
    pub content_hash: String,
    pub status: HashStatus,
    /// RFC 3339 timestamp
    pub resolved_at: String,
}

/// Persisted rewrite counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterRecord {
    /// Requests inspected by a matching provider
    pub processed: u64,
    /// Requests whose URL was rewritten
    pub cleaned: u64,
    pub redirected: u64,
    pub blocked: u64,
    pub whitelisted: u64,
}

impl CounterRecord {
    /// Counter names as stored in the database
    pub const NAMES: [&'static str; 5] = ["processed", "cleaned", "redirected", "blocked", "whitelisted"];

    pub fn get(&self, name: &str) -> Option<u64> {
        match name {
            "processed" => Some(self.processed),
            "cleaned" => Some(self.cleaned),
            "redirected" => Some(self.redirected),
            "blocked" => Some(self.blocked),
            "whitelisted" => Some(self.whitelisted),
            _ => None,
        }
    }

    pub fn set(&mut self, name: &str, value: u64) {
        match name {
            "processed" => self.processed = value,
            "cleaned" => self.cleaned = value,
            "redirected" => self.redirected = value,
            "blocked" => self.blocked = value,
            "whitelisted" => self.whitelisted = value,
            _ => tracing::debug!("Ignoring unknown counter '{}'", name),
        }
    }
}
