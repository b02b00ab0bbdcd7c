//! Rewrite engine behavior against realistic providers

use crate::common::{bundled_rules, compiler};
use linkscrub::config::EngineConfig;
use linkscrub::provider::{ProviderData, ProviderList, RequestMeta, RuleEngine, WHITELIST_RULE};
use linkscrub::{PatternCompiler, Provider, WhitelistMatcher};
use std::sync::Arc;

fn meta() -> RequestMeta {
    RequestMeta::new("GET", "main_frame")
}

fn engine_with_referral() -> RuleEngine {
    RuleEngine::new(
        EngineConfig {
            referral_marketing: true,
            ..Default::default()
        },
        WhitelistMatcher::default(),
    )
}

/// Cleans `url` with whichever bundled provider governs it
fn clean(list: &ProviderList, engine: &RuleEngine, url: &str) -> (String, bool) {
    let provider = list
        .find(url, "GET", "main_frame", &[])
        .unwrap_or_else(|| panic!("No provider for {}", url));
    let outcome = engine.apply(provider, url, &meta());
    (outcome.url, outcome.changed)
}

#[test]
fn test_amazon_style_provider_end_to_end() {
    let provider = Provider::from_data(
        "amazon",
        &ProviderData {
            url_pattern: Some(r"^https?://(?:[a-z0-9-]+\.)*?amazon(?:\.[a-z]{2,}){1,}".into()),
            rules: vec!["tag".into(), "qid".into()],
            ..Default::default()
        },
        Arc::new(PatternCompiler::default()),
    );

    let outcome = RuleEngine::default().apply(
        &provider,
        "https://www.amazon.com/dp/B000/?tag=abc123&qid=555&keepme=1",
        &meta(),
    );

    assert_eq!(outcome.url, "https://www.amazon.com/dp/B000/?keepme=1");
    assert!(outcome.changed);
    assert!(!outcome.cancel);
    assert!(!outcome.redirect);
}

#[test]
fn test_bundled_rules_clean_common_trackers() {
    let list = ProviderList::from_rule_file(&bundled_rules(), compiler());
    let engine = engine_with_referral();

    let cases = [
        (
            "https://www.amazon.de/dp/B01/ref=sr_1_3?keywords=lamp&qid=1690000000&sr=8-3&tag=aff-21&th=1",
            "https://www.amazon.de/dp/B01",
        ),
        (
            "https://example.com/article?utm_source=newsletter&utm_medium=email&id=7#utm_campaign=spring",
            "https://example.com/article?id=7",
        ),
        (
            "https://www.facebook.com/some.page?__tn__=K-R&eid=ARb&fref=nf",
            "https://www.facebook.com/some.page",
        ),
        (
            "https://twitter.com/user/status/1?s=20&t=abc",
            "https://twitter.com/user/status/1",
        ),
        (
            "https://www.youtube.com/watch?v=abc&feature=share&si=xyz",
            "https://www.youtube.com/watch?v=abc",
        ),
    ];

    for (input, expected) in cases {
        let (cleaned, changed) = clean(&list, &engine, input);
        assert_eq!(cleaned, expected, "cleaning {}", input);
        assert!(changed);
    }
}

#[test]
fn test_cleaning_is_idempotent() {
    let list = ProviderList::from_rule_file(&bundled_rules(), compiler());
    let engine = engine_with_referral();

    let urls = [
        "https://www.amazon.co.uk/gp/product/B02/ref=ppx_yo?ie=UTF8&psc=1&smid=A1",
        "https://shop.example.org/p/1?gclid=abc&fbclid=def&color=red&utm_term=x",
        "https://www.google.com/search?q=rust&sxsrf=abc&ei=xyz&ved=0ah",
        "https://m.facebook.com/story.php?story_fbid=1&id=2&refid=8&__tn__=C",
        "https://news.example.net/a?mc_cid=1&mc_eid=2#pk_campaign=x&section=3",
        "https://plain.example.com/nothing/to/do?page=2",
    ];

    for url in urls {
        let (first, _) = clean(&list, &engine, url);
        let (second, changed) = clean(&list, &engine, &first);
        assert_eq!(second, first, "second pass over {}", url);
        assert!(!changed, "second pass over {} changed it", url);
    }
}

#[test]
fn test_redirection_wins_over_stripping() {
    let list = ProviderList::from_rule_file(&bundled_rules(), compiler());
    let engine = RuleEngine::default();

    let url = "https://www.google.com/url?sa=t&url=https%3A%2F%2Fexample.org%2Fpage&ved=2ahU";
    let provider = list.find(url, "GET", "main_frame", &[]).expect("google provider");
    let outcome = engine.apply(provider, url, &meta());

    assert!(outcome.redirect);
    assert!(outcome.changed);
    assert_eq!(outcome.url, "https://example.org/page");
    assert_eq!(outcome.log.len(), 1);
}

#[test]
fn test_domain_redirection_reads_target_parameter() {
    let list = ProviderList::from_rule_file(&bundled_rules(), compiler());
    let url = "https://l.facebook.com/l.php?u=https%3A%2F%2Fexample.net%2Fstory&h=AT0";
    let provider = list.find(url, "GET", "main_frame", &[]).expect("facebook provider");
    let outcome = RuleEngine::default().apply(provider, url, &meta());

    assert!(outcome.redirect);
    assert_eq!(outcome.url, "https://example.net/story");
}

#[test]
fn test_complete_provider_blocks() {
    let list = ProviderList::from_rule_file(&bundled_rules(), compiler());
    let url = "https://ad.doubleclick.net/ddm/trackclk/N1;dc_trk_aid=1";
    let provider = list.find(url, "GET", "image", &[]).expect("doubleclick provider");
    let outcome = RuleEngine::default().apply(provider, url, &RequestMeta::new("GET", "image"));

    assert!(outcome.cancel);
    assert!(!outcome.changed);
}

#[test]
fn test_any_tld_domain_pattern() {
    let compiler = compiler();
    assert!(compiler.matches("||example.*^", "https://example.co.uk/page"));
    assert!(compiler.matches("||example.*^", "https://www.example.de/x"));
    assert!(!compiler.matches("||example.*^", "https://notexample.com/"));
}

#[test]
fn test_whitelist_covers_subdomains_only() {
    let engine = RuleEngine::new(EngineConfig::default(), WhitelistMatcher::new(["example.com"]));
    let provider = Provider::from_data(
        "any",
        &ProviderData {
            url_pattern: Some(".*".into()),
            rules: vec!["utm_source".into()],
            ..Default::default()
        },
        Arc::new(PatternCompiler::default()),
    );

    let bypassed = engine.apply(&provider, "https://ads.example.com/x?utm_source=a", &meta());
    assert!(bypassed.whitelisted);
    assert!(!bypassed.changed);
    assert_eq!(bypassed.log[0].rule, WHITELIST_RULE);

    let cleaned = engine.apply(&provider, "https://exampleads.com/x?utm_source=a", &meta());
    assert!(!cleaned.whitelisted);
    assert_eq!(cleaned.url, "https://exampleads.com/x");
}
