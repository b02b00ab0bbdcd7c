//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::provider::LogEntry;
use crate::rules::{parse_disabled_signatures, HashStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{CounterRecord, RulesStatusRecord};
use crate::ScrubError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const KEY_CUSTOM_RULES: &str = "custom_rules";
const KEY_CACHED_RULES: &str = "cached_rules";
const KEY_DISABLED: &str = "disabled_providers";
const KEY_WHITELIST: &str = "whitelist";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`
    pub fn new(path: &Path) -> Result<Self, ScrubError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, ScrubError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn get_value(&self, key: &str) -> StorageResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_value(&mut self, key: &str, value: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, now],
        )?;
        Ok(())
    }

    fn get_string_list(&self, key: &str) -> StorageResult<Vec<String>> {
        match self.get_value(key)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }
}

impl Storage for SqliteStorage {
    // ===== Rule Sources =====

    fn load_custom_rules(&self) -> StorageResult<Option<String>> {
        self.get_value(KEY_CUSTOM_RULES)
    }

    fn save_custom_rules(&mut self, json: &str) -> StorageResult<()> {
        self.set_value(KEY_CUSTOM_RULES, json)
    }

    fn load_cached_rules(&self) -> StorageResult<Option<String>> {
        self.get_value(KEY_CACHED_RULES)
    }

    fn save_cached_rules(&mut self, json: &str) -> StorageResult<()> {
        self.set_value(KEY_CACHED_RULES, json)
    }

    fn load_disabled_signatures(&self) -> StorageResult<Vec<String>> {
        Ok(self
            .get_value(KEY_DISABLED)?
            .map(|json| parse_disabled_signatures(&json))
            .unwrap_or_default())
    }

    fn save_disabled_signatures(&mut self, signatures: &[String]) -> StorageResult<()> {
        let json = serde_json::to_string(signatures)?;
        self.set_value(KEY_DISABLED, &json)
    }

    fn load_rules_status(&self) -> StorageResult<Option<RulesStatusRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT content_hash, status, resolved_at FROM rules_status WHERE id = 1",
                [],
                |row| {
                    let status: String = row.get(1)?;
                    Ok((row.get::<_, String>(0)?, status, row.get::<_, String>(2)?))
                },
            )
            .optional()?;

        let Some((content_hash, status, resolved_at)) = record else {
            return Ok(None);
        };
        let status = HashStatus::from_db_string(&status)
            .ok_or_else(|| StorageError::Database(format!("Unknown rules status '{}'", status)))?;

        Ok(Some(RulesStatusRecord {
            content_hash,
            status,
            resolved_at,
        }))
    }

    fn save_rules_status(&mut self, record: &RulesStatusRecord) -> StorageResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO rules_status (id, content_hash, status, resolved_at)
             VALUES (1, ?1, ?2, ?3)",
            params![
                record.content_hash,
                record.status.to_db_string(),
                record.resolved_at
            ],
        )?;
        Ok(())
    }

    // ===== Whitelist =====

    fn load_whitelist(&self) -> StorageResult<Vec<String>> {
        self.get_string_list(KEY_WHITELIST)
    }

    fn save_whitelist(&mut self, entries: &[String]) -> StorageResult<()> {
        let json = serde_json::to_string(entries)?;
        self.set_value(KEY_WHITELIST, &json)
    }

    // ===== Log & Counters =====

    fn replace_log(&mut self, entries: &[LogEntry]) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM log_entries", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO log_entries
                 (before_url, after_url, rule, provider_name, pattern_type, pattern_value,
                  request_method, provider_methods, request_type, provider_resource_types, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for entry in entries {
                stmt.execute(params![
                    entry.before,
                    entry.after,
                    entry.rule,
                    entry.provider_name,
                    entry.pattern_type,
                    entry.pattern_value,
                    entry.request_method,
                    serde_json::to_string(&entry.provider_methods)?,
                    entry.request_type,
                    serde_json::to_string(&entry.provider_resource_types)?,
                    entry.timestamp,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn load_log(&self) -> StorageResult<Vec<LogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT before_url, after_url, rule, provider_name, pattern_type, pattern_value,
                    request_method, provider_methods, request_type, provider_resource_types, timestamp
             FROM log_entries ORDER BY id",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                LogEntry {
                    before: row.get(0)?,
                    after: row.get(1)?,
                    rule: row.get(2)?,
                    provider_name: row.get(3)?,
                    pattern_type: row.get(4)?,
                    pattern_value: row.get(5)?,
                    request_method: row.get(6)?,
                    provider_methods: Vec::new(),
                    request_type: row.get(8)?,
                    provider_resource_types: Vec::new(),
                    timestamp: row.get(10)?,
                },
                row.get::<_, String>(7)?,
                row.get::<_, String>(9)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (mut entry, methods, resource_types) = row?;
            entry.provider_methods = serde_json::from_str(&methods)?;
            entry.provider_resource_types = serde_json::from_str(&resource_types)?;
            entries.push(entry);
        }

        Ok(entries)
    }

    fn load_counters(&self) -> StorageResult<CounterRecord> {
        let mut stmt = self.conn.prepare("SELECT name, value FROM counters")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counters = CounterRecord::default();
        for row in rows {
            let (name, value) = row?;
            counters.set(&name, value.max(0) as u64);
        }

        Ok(counters)
    }

    fn save_counters(&mut self, counters: &CounterRecord) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        for name in CounterRecord::NAMES {
            let value = counters.get(name).unwrap_or_default();
            tx.execute(
                "INSERT OR REPLACE INTO counters (name, value) VALUES (?1, ?2)",
                params![name, value as i64],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(before: &str, rule: &str) -> LogEntry {
        LogEntry {
            before: before.to_string(),
            after: "https://example.com/".to_string(),
            rule: rule.to_string(),
            provider_name: "test".to_string(),
            pattern_type: "urlPattern".to_string(),
            pattern_value: ".*".to_string(),
            request_method: "GET".to_string(),
            provider_methods: vec!["GET".to_string()],
            request_type: "main_frame".to_string(),
            provider_resource_types: Vec::new(),
            timestamp: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_create_in_memory() {
        let storage = SqliteStorage::new_in_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_open_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("linkscrub.db");
        {
            let mut storage = SqliteStorage::new(&path).unwrap();
            storage.save_custom_rules(r#"{"providers":{}}"#).unwrap();
        }
        let storage = SqliteStorage::new(&path).unwrap();
        assert_eq!(
            storage.load_custom_rules().unwrap().as_deref(),
            Some(r#"{"providers":{}}"#)
        );
    }

    #[test]
    fn test_rule_documents() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        assert!(storage.load_cached_rules().unwrap().is_none());

        storage.save_cached_rules("{\"a\":1}").unwrap();
        storage.save_cached_rules("{\"a\":2}").unwrap();
        assert_eq!(storage.load_cached_rules().unwrap().as_deref(), Some("{\"a\":2}"));
        assert!(storage.load_custom_rules().unwrap().is_none());
    }

    #[test]
    fn test_disabled_signatures() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        assert!(storage.load_disabled_signatures().unwrap().is_empty());

        storage
            .save_disabled_signatures(&["url:a".to_string(), "domain:||b.com".to_string()])
            .unwrap();
        assert_eq!(
            storage.load_disabled_signatures().unwrap(),
            vec!["url:a", "domain:||b.com"]
        );
    }

    #[test]
    fn test_rules_status() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        assert!(storage.load_rules_status().unwrap().is_none());

        let record = RulesStatusRecord {
            content_hash: "abc".to_string(),
            status: HashStatus::BundledAfterRemoteFailure,
            resolved_at: Utc::now().to_rfc3339(),
        };
        storage.save_rules_status(&record).unwrap();
        storage.save_rules_status(&record).unwrap();
        assert_eq!(storage.load_rules_status().unwrap(), Some(record));
    }

    #[test]
    fn test_whitelist() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        assert!(storage.load_whitelist().unwrap().is_empty());

        storage
            .save_whitelist(&["example.com".to_string(), "*.shop.example".to_string()])
            .unwrap();
        assert_eq!(
            storage.load_whitelist().unwrap(),
            vec!["example.com", "*.shop.example"]
        );
    }

    #[test]
    fn test_replace_log() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .replace_log(&[entry("https://a/?x=1", "x"), entry("https://b/?y=1", "y")])
            .unwrap();
        storage.replace_log(&[entry("https://c/?z=1", "z")]).unwrap();

        let log = storage.load_log().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0], entry("https://c/?z=1", "z"));
    }

    #[test]
    fn test_counters() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        assert_eq!(storage.load_counters().unwrap(), CounterRecord::default());

        let counters = CounterRecord {
            processed: 10,
            cleaned: 4,
            redirected: 2,
            blocked: 1,
            whitelisted: 3,
        };
        storage.save_counters(&counters).unwrap();
        assert_eq!(storage.load_counters().unwrap(), counters);
    }
}
