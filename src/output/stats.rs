//! Statistics from the rule resolver and the rewrite counters
//!
//! This module provides functionality for extracting and displaying
//! rule and rewrite statistics from the storage layer.

use crate::rules::{MergeStats, ResolvedRules, SourceFailure};
use crate::storage::{CounterRecord, RulesStatusRecord, Storage};
use crate::ScrubError;

/// Rule and rewrite statistics summary
#[derive(Debug, Clone, Default)]
pub struct RuleStatistics {
    /// Providers in the active rule set
    pub provider_count: usize,

    /// Counts from the last merge, when the rules were resolved in this process
    pub merge: Option<MergeStats>,

    /// Remote sources that failed in the last resolution
    pub failures: Vec<SourceFailure>,

    /// Persisted outcome of the last resolution
    pub status: Option<RulesStatusRecord>,

    /// Request counters
    pub counters: CounterRecord,

    /// Number of persisted log entries
    pub log_entries: usize,
}

impl RuleStatistics {
    /// Adds the details of a resolution run in this process
    pub fn with_resolution(mut self, resolved: &ResolvedRules) -> Self {
        self.provider_count = resolved.rules.len();
        self.merge = Some(resolved.stats);
        self.failures = resolved.failures.clone();
        self
    }
}

/// Loads statistics from storage
pub fn load_statistics(storage: &dyn Storage) -> Result<RuleStatistics, ScrubError> {
    let status = storage.load_rules_status()?;
    let counters = storage.load_counters()?;
    let log_entries = storage.load_log()?.len();

    Ok(RuleStatistics {
        status,
        counters,
        log_entries,
        ..Default::default()
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &RuleStatistics) {
    println!("=== Linkscrub Statistics ===\n");

    println!("Rules:");
    println!("  Active providers: {}", stats.provider_count);
    match &stats.status {
        Some(status) => {
            println!("  Source: {}", status.status);
            println!("  Content hash: {}", status.content_hash);
            println!("  Resolved at: {}", status.resolved_at);
        }
        None => println!("  Source: never resolved"),
    }
    println!();

    if let Some(merge) = &stats.merge {
        println!("Merge:");
        println!("  Base providers: {}", merge.bundled);
        println!("  Custom providers: {}", merge.custom);
        println!("  Overridden by custom: {}", merge.overridden);
        println!("  Disabled: {}", merge.disabled);
        println!("  Total: {}", merge.total);
        println!();
    }

    if !stats.failures.is_empty() {
        println!("Failed Sources ({}):", stats.failures.len());
        for failure in &stats.failures {
            println!("  - {}: {}", failure.rule_url, failure.error);
        }
        println!();
    }

    let counters = &stats.counters;
    println!("Requests:");
    println!("  Processed: {}", counters.processed);
    println!("  Cleaned: {}", counters.cleaned);
    println!("  Redirected: {}", counters.redirected);
    println!("  Blocked: {}", counters.blocked);
    println!("  Whitelisted: {}", counters.whitelisted);
    println!("  Log entries: {}", stats.log_entries);
    println!();

    let changed = counters.cleaned + counters.redirected + counters.blocked;
    let rate = if counters.processed > 0 {
        (changed as f64 / counters.processed as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "Change Rate: {:.1}% ({} / {} matched requests changed)",
        rate, changed, counters.processed
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::HashStatus;
    use crate::storage::SqliteStorage;

    #[test]
    fn test_load_statistics_from_empty_storage() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let stats = load_statistics(&storage).unwrap();
        assert!(stats.status.is_none());
        assert_eq!(stats.counters, CounterRecord::default());
        assert_eq!(stats.log_entries, 0);
    }

    #[test]
    fn test_load_statistics() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .save_rules_status(&RulesStatusRecord {
                content_hash: "ff".to_string(),
                status: HashStatus::Cache,
                resolved_at: "2024-01-01T00:00:00+00:00".to_string(),
            })
            .unwrap();
        storage
            .save_counters(&CounterRecord {
                processed: 3,
                cleaned: 2,
                ..Default::default()
            })
            .unwrap();

        let stats = load_statistics(&storage).unwrap();
        assert_eq!(stats.status.map(|s| s.status), Some(HashStatus::Cache));
        assert_eq!(stats.counters.cleaned, 2);
    }
}
