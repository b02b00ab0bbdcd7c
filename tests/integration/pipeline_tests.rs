//! Rule resolution: verification, fallback tiers and merging

use crate::common::{bundled_rules, remote_source, rules_config, FakeFetcher};
use linkscrub::config::RemoteSource;
use linkscrub::provider::{ProviderData, RuleFile};
use linkscrub::rules::{fetch_source, sha256_hex, HttpFetcher, ProviderMerger, RuleSourceError};
use linkscrub::storage::{shared, SqliteStorage, Storage};
use linkscrub::{HashStatus, RuleSourceResolver};
use std::sync::Arc;
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, ResponseTemplate};

const REMOTE_RULES: &str = r#"{
  "metadata": {"name": "remote", "version": "7"},
  "providers": {
    "newsletter": {
      "urlPattern": "^https?://(?:[a-z0-9-]+\\.)*?mailer\\.example",
      "rules": ["mkt_tok", "trk"]
    }
  }
}"#;

const AMAZON_PATTERN: &str = r"^https?://(?:[a-z0-9-]+\.)*?amazon(?:\.[a-z]{2,}){1,}";

fn tampered(document: &str) -> Vec<u8> {
    let mut bytes = document.as_bytes().to_vec();
    let index = document.find("mkt_tok").expect("marker present");
    bytes[index] = b'n';
    bytes
}

#[tokio::test]
async fn test_verified_remote_source_is_used_and_cached() {
    let source = remote_source("main");
    let fetcher = FakeFetcher::default()
        .with(&source.rule_url, REMOTE_RULES.as_bytes())
        .with(&source.hash_url, sha256_hex(REMOTE_RULES.as_bytes()).as_bytes());
    let storage = shared(SqliteStorage::new_in_memory().unwrap());

    let resolver = RuleSourceResolver::new(
        rules_config(vec![source.clone()]),
        Arc::new(fetcher),
        Some(Arc::clone(&storage)),
    );
    let resolved = resolver.resolve().await;

    assert_eq!(resolved.status, HashStatus::RemoteVerified);
    assert!(resolved.failures.is_empty());
    assert!(resolved.rules.providers.contains_key("newsletter"));
    assert_eq!(resolved.rules.metadata.version.as_deref(), Some("7"));
    assert_eq!(resolved.rules.metadata.source.as_deref(), Some("remote_verified"));

    // Every source fails on the next cycle; the cached copy takes over.
    let offline = RuleSourceResolver::new(
        rules_config(vec![source]),
        Arc::new(FakeFetcher::default()),
        Some(Arc::clone(&storage)),
    );
    let resolved = offline.resolve().await;
    assert_eq!(resolved.status, HashStatus::Cache);
    assert!(resolved.rules.providers.contains_key("newsletter"));
    assert_eq!(resolved.failures.len(), 1);

    let record = storage.lock().unwrap().load_rules_status().unwrap().unwrap();
    assert_eq!(record.status, HashStatus::Cache);
    assert_eq!(record.content_hash, resolved.content_hash);
}

#[tokio::test]
async fn test_tampered_remote_source_is_rejected() {
    let source = remote_source("main");
    let fetcher = FakeFetcher::default()
        .with(&source.rule_url, &tampered(REMOTE_RULES))
        .with(&source.hash_url, sha256_hex(REMOTE_RULES.as_bytes()).as_bytes());

    let err = fetch_source(&fetcher, &source).await.unwrap_err();
    assert!(matches!(err, RuleSourceError::HashMismatch { .. }));

    let resolver = RuleSourceResolver::new(rules_config(vec![source]), Arc::new(fetcher), None);
    let resolved = resolver.resolve().await;

    assert_eq!(resolved.status, HashStatus::BundledAfterRemoteFailure);
    assert!(!resolved.rules.providers.contains_key("newsletter"));
    assert_eq!(resolved.stats.bundled, bundled_rules().len());
    assert_eq!(resolved.failures.len(), 1);
}

#[tokio::test]
async fn test_one_failing_source_does_not_block_others() {
    let good = remote_source("good");
    let bad = remote_source("bad");
    let fetcher = FakeFetcher::default()
        .with(&good.rule_url, REMOTE_RULES.as_bytes())
        .with(&good.hash_url, sha256_hex(REMOTE_RULES.as_bytes()).as_bytes())
        .with(&bad.rule_url, REMOTE_RULES.as_bytes())
        .with(&bad.hash_url, b"not-a-hash");

    let resolver = RuleSourceResolver::new(rules_config(vec![bad, good]), Arc::new(fetcher), None);
    let resolved = resolver.resolve().await;

    assert_eq!(resolved.status, HashStatus::RemotePartial);
    assert_eq!(resolved.failures.len(), 1);
    assert_eq!(resolved.failures[0].rule_url, "https://rules.test/bad.json");
    assert!(resolved.rules.providers.contains_key("newsletter"));
}

#[tokio::test]
async fn test_plain_http_source_is_never_fetched() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_string(REMOTE_RULES))
        .expect(0)
        .mount(&server)
        .await;

    let source = RemoteSource {
        rule_url: format!("{}/rules.json", server.uri()),
        hash_url: format!("{}/rules.sha256", server.uri()),
    };
    let fetcher = HttpFetcher::with_client(reqwest::Client::new());

    let err = fetch_source(&fetcher, &source).await.unwrap_err();
    assert!(matches!(err, RuleSourceError::InvalidSource(_)));
}

#[tokio::test]
async fn test_source_without_hash_is_never_fetched() {
    let source = RemoteSource {
        rule_url: "https://rules.test/main.json".to_string(),
        hash_url: String::new(),
    };
    let fetcher = FakeFetcher::default().with(&source.rule_url, REMOTE_RULES.as_bytes());

    let err = fetch_source(&fetcher, &source).await.unwrap_err();
    assert!(matches!(err, RuleSourceError::InvalidSource(_)));
    assert_eq!(fetcher.requests(), 0);
}

#[tokio::test]
async fn test_custom_provider_replaces_bundled_provider() {
    let storage = shared(SqliteStorage::new_in_memory().unwrap());
    let custom = serde_json::json!({
        "providers": {
            "my-amazon": {
                "urlPattern": AMAZON_PATTERN,
                "rules": ["custom_only"]
            }
        }
    });
    storage
        .lock()
        .unwrap()
        .save_custom_rules(&custom.to_string())
        .unwrap();

    let resolver = RuleSourceResolver::new(
        rules_config(Vec::new()),
        Arc::new(FakeFetcher::default()),
        Some(storage),
    );
    let resolved = resolver.resolve().await;

    assert_eq!(resolved.status, HashStatus::Bundled);
    assert_eq!(resolved.stats.overridden, 1);
    assert_eq!(resolved.stats.custom, 1);

    let amazon: Vec<&ProviderData> = resolved
        .rules
        .providers
        .values()
        .filter(|p| p.url_pattern.as_deref() == Some(AMAZON_PATTERN))
        .collect();
    assert_eq!(amazon.len(), 1);
    assert_eq!(amazon[0].rules, vec!["custom_only".to_string()]);
    assert!(amazon[0].raw_rules.is_empty());
}

#[test]
fn test_shared_domain_pattern_stays_with_one_provider() {
    let base = RuleFile::parse_lenient(
        r#"{"providers": {
            "a-tracker": {"domainPatterns": ["tracker.example"], "rules": ["a"]},
            "b-tracker": {"domainPatterns": ["tracker.example"], "rules": ["b"]},
            "c-tracker": {"domainPatterns": ["tracker.example", "other.example"], "rules": ["c"]}
        }}"#,
    );

    let (merged, stats) = ProviderMerger::new(Vec::<String>::new()).merge(&base, &RuleFile::default());

    let holders = merged
        .providers
        .values()
        .filter(|p| p.domain_patterns.iter().any(|d| d == "tracker.example"))
        .count();
    assert_eq!(holders, 1);
    assert!(merged
        .providers
        .values()
        .any(|p| p.domain_patterns == vec!["other.example".to_string()]));
    assert_eq!(stats.total, merged.len());
    assert_eq!(merged.len(), 2);
}

#[tokio::test]
async fn test_disabled_provider_is_left_out() {
    let storage = shared(SqliteStorage::new_in_memory().unwrap());
    let key = format!("url:{}", AMAZON_PATTERN);
    storage
        .lock()
        .unwrap()
        .save_disabled_signatures(&[key])
        .unwrap();

    let resolver = RuleSourceResolver::new(
        rules_config(Vec::new()),
        Arc::new(FakeFetcher::default()),
        Some(storage),
    );
    let resolved = resolver.resolve().await;

    assert_eq!(resolved.stats.disabled, 1);
    assert!(resolved
        .rules
        .providers
        .values()
        .all(|p| p.url_pattern.as_deref() != Some(AMAZON_PATTERN)));
}
