//! Shared fixtures

use async_trait::async_trait;
use linkscrub::config::{RemoteSource, RulesConfig};
use linkscrub::pattern::{PatternCompiler, SuffixSet};
use linkscrub::provider::RuleFile;
use linkscrub::rules::{RuleFetcher, RuleSourceError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Path of the rule file shipped with the crate
pub fn bundled_path() -> String {
    format!("{}/data/rules.json", env!("CARGO_MANIFEST_DIR"))
}

pub fn bundled_rules() -> RuleFile {
    let json = std::fs::read_to_string(bundled_path()).expect("Failed to read bundled rules");
    RuleFile::parse_lenient(&json)
}

/// Compiler with enough suffixes for the hosts used in these tests
pub fn compiler() -> Arc<PatternCompiler> {
    Arc::new(PatternCompiler::new(Some(Arc::new(SuffixSet::new([
        "com", "de", "net", "org", "uk", "co.uk", "be",
    ])))))
}

pub fn remote_source(name: &str) -> RemoteSource {
    RemoteSource {
        rule_url: format!("https://rules.test/{}.json", name),
        hash_url: format!("https://rules.test/{}.sha256", name),
    }
}

/// Rules config that reads the bundled file and fetches `sources`
pub fn rules_config(sources: Vec<RemoteSource>) -> RulesConfig {
    RulesConfig {
        remote_enabled: !sources.is_empty(),
        remote: sources,
        bundled_path: bundled_path(),
        ..Default::default()
    }
}

/// Serves canned documents keyed by URL and counts requests
#[derive(Default)]
pub struct FakeFetcher {
    documents: HashMap<String, Vec<u8>>,
    requests: AtomicUsize,
}

impl FakeFetcher {
    pub fn with(mut self, url: &str, body: &[u8]) -> Self {
        self.documents.insert(url.to_string(), body.to_vec());
        self
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RuleFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, RuleSourceError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.documents.get(url).cloned().ok_or(RuleSourceError::Http {
            url: url.to_string(),
            status: 404,
        })
    }
}
