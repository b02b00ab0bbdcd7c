//! Multi-tier rule resolution
//!
//! # Tiers
//!
//! | Tier | Used when |
//! |------|-----------|
//! | Remote | Remote rules are enabled and at least one source verifies |
//! | Cache | Every remote source failed |
//! | Bundled | Remote is disabled, or remote and cache both failed |
//! | Emergency | The bundled file cannot be read or has no providers |
//! | Custom only | Built-in rules are disabled |
//!
//! The winning tier is always merged with the user's custom rules.

use crate::config::{validate_remote_source, RemoteSource, RulesConfig};
use crate::provider::RuleFile;
use crate::rules::fallback::emergency_rules;
use crate::rules::fetcher::{HttpFetcher, RuleFetcher};
use crate::rules::merge::{MergeStats, ProviderMerger};
use crate::rules::verify::{content_hash, parse_hash_document, verify_rules};
use crate::rules::{HashStatus, MergedRuleSet, RuleSourceError};
use crate::storage::{RulesStatusRecord, SharedStorage, Storage, StorageResult};
use crate::ScrubError;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// A remote source that failed during a resolution cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub rule_url: String,
    pub error: String,
}

/// Result of one resolution cycle
#[derive(Debug, Clone)]
pub struct ResolvedRules {
    pub rules: MergedRuleSet,
    pub stats: MergeStats,
    pub status: HashStatus,
    /// SHA-256 over the key-sorted JSON of `rules`
    pub content_hash: String,
    pub failures: Vec<SourceFailure>,
}

/// Produces the active rule set from the configured sources
pub struct RuleSourceResolver {
    config: RulesConfig,
    fetcher: Arc<dyn RuleFetcher>,
    storage: Option<SharedStorage>,
}

impl RuleSourceResolver {
    pub fn new(config: RulesConfig, fetcher: Arc<dyn RuleFetcher>, storage: Option<SharedStorage>) -> Self {
        Self {
            config,
            fetcher,
            storage,
        }
    }

    /// Creates a resolver that fetches over HTTPS with the configured timeout
    pub fn from_config(config: &RulesConfig, storage: Option<SharedStorage>) -> Result<Self, ScrubError> {
        let fetcher = HttpFetcher::new(Duration::from_secs(config.fetch_timeout_secs))?;
        Ok(Self::new(config.clone(), Arc::new(fetcher), storage))
    }

    /// Runs one resolution cycle
    ///
    /// Never fails: the worst case is the emergency rule set merged with
    /// whatever custom rules could be loaded.
    pub async fn resolve(&self) -> ResolvedRules {
        let custom = self.load_custom();

        let (base, status, failures) = if self.config.builtin_enabled {
            self.acquire_base().await
        } else {
            tracing::info!("Built-in rules disabled, using custom rules only");
            (RuleFile::default(), HashStatus::CustomOnly, Vec::new())
        };

        let disabled = self
            .with_storage(|s| s.load_disabled_signatures())
            .unwrap_or_default();
        let (mut rules, stats) = ProviderMerger::new(disabled).merge(&base, &custom);

        rules.metadata = base.metadata;
        rules.metadata.source = Some(status.to_db_string().to_string());
        rules.metadata.provider_count = Some(rules.len());

        let content_hash = match content_hash(&rules) {
            Ok(hash) => hash,
            Err(e) => {
                tracing::warn!("Failed to hash merged rules: {}", e);
                String::new()
            }
        };

        tracing::info!(
            "Resolved {} providers ({}; {} bundled, {} custom, {} overridden, {} disabled)",
            stats.total,
            status,
            stats.bundled,
            stats.custom,
            stats.overridden,
            stats.disabled
        );

        let record = RulesStatusRecord {
            content_hash: content_hash.clone(),
            status,
            resolved_at: Utc::now().to_rfc3339(),
        };
        self.with_storage(|s| s.save_rules_status(&record));

        ResolvedRules {
            rules,
            stats,
            status,
            content_hash,
            failures,
        }
    }

    /// Picks the base rule set from the remote, cache, bundled and
    /// emergency tiers
    async fn acquire_base(&self) -> (RuleFile, HashStatus, Vec<SourceFailure>) {
        let remote_configured = self.config.remote_enabled && !self.config.remote.is_empty();
        let mut failures = Vec::new();

        if remote_configured {
            let (successes, failed) = self.fetch_remote().await;
            failures = failed;

            let combined = ProviderMerger::combine(&successes);
            if !combined.is_empty() {
                match combined.to_json() {
                    Ok(json) => {
                        self.with_storage(|s| s.save_cached_rules(&json));
                    }
                    Err(e) => tracing::warn!("Failed to serialize remote rules for caching: {}", e),
                }
                let status = if failures.is_empty() {
                    HashStatus::RemoteVerified
                } else {
                    HashStatus::RemotePartial
                };
                return (combined, status, failures);
            }

            tracing::warn!("All remote rule sources failed, trying cache");
            if let Some(cached) = self.load_cached() {
                return (cached, HashStatus::Cache, failures);
            }
        }

        if let Some(bundled) = self.load_bundled() {
            let status = if remote_configured {
                HashStatus::BundledAfterRemoteFailure
            } else {
                HashStatus::Bundled
            };
            return (bundled, status, failures);
        }

        tracing::error!("Bundled rules unusable, falling back to emergency rules");
        (emergency_rules(), HashStatus::EmergencyFallback, failures)
    }

    /// Fetches every remote source concurrently; failures do not block
    /// successes
    async fn fetch_remote(&self) -> (Vec<RuleFile>, Vec<SourceFailure>) {
        let mut tasks = JoinSet::new();
        for (index, source) in self.config.remote.iter().cloned().enumerate() {
            let fetcher = Arc::clone(&self.fetcher);
            tasks.spawn(async move {
                let result = fetch_source(fetcher.as_ref(), &source).await;
                (index, source.rule_url, result)
            });
        }

        let mut results = Vec::with_capacity(self.config.remote.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => tracing::error!("Remote fetch task failed: {}", e),
            }
        }
        results.sort_by_key(|(index, _, _)| *index);

        let mut successes = Vec::new();
        let mut failures = Vec::new();
        for (_, rule_url, result) in results {
            match result {
                Ok(rules) => {
                    tracing::info!("Verified {} providers from {}", rules.len(), rule_url);
                    successes.push(rules);
                }
                Err(e) => {
                    tracing::warn!("Remote rule source {} failed: {}", rule_url, e);
                    failures.push(SourceFailure {
                        rule_url,
                        error: e.to_string(),
                    });
                }
            }
        }

        (successes, failures)
    }

    fn load_custom(&self) -> RuleFile {
        self.with_storage(|s| s.load_custom_rules())
            .flatten()
            .map(|json| RuleFile::parse_lenient(&json))
            .unwrap_or_default()
    }

    fn load_cached(&self) -> Option<RuleFile> {
        self.with_storage(|s| s.load_cached_rules())
            .flatten()
            .map(|json| RuleFile::parse_lenient(&json))
            .filter(|rules| !rules.is_empty())
    }

    fn load_bundled(&self) -> Option<RuleFile> {
        let path = Path::new(&self.config.bundled_path);
        match std::fs::read_to_string(path) {
            Ok(json) => {
                let rules = RuleFile::parse_lenient(&json);
                if rules.is_empty() {
                    tracing::warn!("Bundled rules at {} have no providers", path.display());
                    None
                } else {
                    Some(rules)
                }
            }
            Err(e) => {
                tracing::warn!("Failed to read bundled rules at {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Runs a storage operation, logging and swallowing failures
    fn with_storage<T, F>(&self, op: F) -> Option<T>
    where
        F: FnOnce(&mut (dyn Storage + Send)) -> StorageResult<T>,
    {
        let storage = self.storage.as_ref()?;
        let mut guard = storage.lock().unwrap_or_else(|e| e.into_inner());
        match op(&mut *guard) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Storage operation failed: {}", e);
                None
            }
        }
    }
}

/// Fetches and verifies one remote source
///
/// The hash document is fetched first; the rule document is accepted only
/// if its SHA-256 equals that hash exactly.
pub async fn fetch_source(
    fetcher: &dyn RuleFetcher,
    source: &RemoteSource,
) -> Result<RuleFile, RuleSourceError> {
    validate_remote_source(source)?;

    let hash_document = fetcher.fetch(&source.hash_url).await?;
    let hash_document = String::from_utf8_lossy(&hash_document);
    parse_hash_document(&hash_document)?;

    let body = fetcher.fetch(&source.rule_url).await?;
    let verification = verify_rules(&body, &hash_document);
    tracing::debug!(
        "Verification of {}: computed {}, expected {}, verified {}",
        source.rule_url,
        verification.computed_hash,
        verification.expected_hash,
        verification.verified
    );
    verification.into_result()?;

    let rules = RuleFile::parse_lenient(&String::from_utf8_lossy(&body));
    if rules.is_empty() {
        return Err(RuleSourceError::Empty(source.rule_url.clone()));
    }
    Ok(rules)
}
