use serde::Deserialize;

/// Main configuration structure for Linkscrub
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub suffix: SuffixConfig,
}

/// Rule acquisition configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RulesConfig {
    /// Whether bundled/remote rules are used at all; false means custom rules only
    #[serde(rename = "builtin-enabled", default = "default_true")]
    pub builtin_enabled: bool,

    /// Whether remote rule sources are fetched
    #[serde(rename = "remote-enabled", default = "default_true")]
    pub remote_enabled: bool,

    /// Path to the rule file shipped with the application
    #[serde(rename = "bundled-path", default = "default_bundled_path")]
    pub bundled_path: String,

    /// Abort timeout for each remote fetch (seconds)
    #[serde(rename = "fetch-timeout-secs", default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Remote rule sources, each a rule document plus its hash document
    #[serde(default)]
    pub remote: Vec<RemoteSource>,
}

/// One remote rule source
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteSource {
    /// URL of the rules JSON document
    #[serde(rename = "rule-url")]
    pub rule_url: String,

    /// URL of the companion hex-encoded SHA-256 document
    #[serde(rename = "hash-url", default)]
    pub hash_url: String,
}

/// Rewrite engine switches
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Apply `referralMarketing` rules as well as plain rules
    #[serde(rename = "referral-marketing", default)]
    pub referral_marketing: bool,

    /// Cancel requests governed by complete providers
    #[serde(rename = "domain-blocking", default = "default_true")]
    pub domain_blocking: bool,

    /// Never rewrite URLs whose host is loopback/private/link-local
    #[serde(rename = "skip-local-hosts", default = "default_true")]
    pub skip_local_hosts: bool,

    /// Record every rewrite in the log buffer
    #[serde(default = "default_true")]
    pub logging: bool,

    /// Global resource-type allow-list (empty = all types)
    #[serde(rename = "resource-types", default)]
    pub resource_types: Vec<String>,
}

/// Rewrite log configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Maximum retained log entries
    #[serde(default = "default_log_limit")]
    pub limit: usize,

    /// Debounce window for persisting the log and counters (milliseconds)
    #[serde(rename = "flush-interval-ms", default = "default_flush_interval")]
    pub flush_interval_ms: u64,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: String,
}

/// Public suffix list configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SuffixConfig {
    /// Path to a public_suffix_list.dat file; any-TLD patterns fall back to
    /// generic matching when absent
    #[serde(rename = "list-path", default)]
    pub list_path: Option<String>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            builtin_enabled: true,
            remote_enabled: true,
            bundled_path: default_bundled_path(),
            fetch_timeout_secs: default_fetch_timeout(),
            remote: Vec::new(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            referral_marketing: false,
            domain_blocking: true,
            skip_local_hosts: true,
            logging: true,
            resource_types: Vec::new(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            limit: default_log_limit(),
            flush_interval_ms: default_flush_interval(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_bundled_path() -> String {
    "data/rules.json".to_string()
}

fn default_fetch_timeout() -> u64 {
    10
}

fn default_log_limit() -> usize {
    1000
}

fn default_flush_interval() -> u64 {
    1000
}

fn default_database_path() -> String {
    "./linkscrub.db".to_string()
}
