//! Applies one provider's rules to one URL

use crate::config::EngineConfig;
use crate::provider::provider::Provider;
use crate::url::{extract_host, is_local_host, UrlParts};
use crate::whitelist::WhitelistMatcher;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Rule name recorded for whitelist bypasses
pub const WHITELIST_RULE: &str = "@whitelist";

/// Rule name recorded for complete-provider cancellations
pub const BLOCK_RULE: &str = "@block";

/// Request attributes the engine needs besides the URL
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub method: String,
    pub resource_type: String,
    /// Tab, frame ancestors, referer and initiator URLs
    pub context_urls: Vec<String>,
}

impl RequestMeta {
    pub fn new(method: &str, resource_type: &str) -> Self {
        Self {
            method: method.to_string(),
            resource_type: resource_type.to_string(),
            context_urls: Vec::new(),
        }
    }

    pub fn with_context<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context_urls.extend(urls.into_iter().map(Into::into));
        self
    }
}

/// One distinguishable change to a URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub before: String,
    pub after: String,
    pub rule: String,
    pub provider_name: String,
    pub pattern_type: String,
    pub pattern_value: String,
    pub request_method: String,
    pub provider_methods: Vec<String>,
    pub request_type: String,
    pub provider_resource_types: Vec<String>,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

/// Result of applying a provider to a URL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteOutcome {
    /// The final URL (the input when nothing changed)
    pub url: String,
    pub changed: bool,
    pub cancel: bool,
    pub redirect: bool,
    pub whitelisted: bool,
    pub log: Vec<LogEntry>,
}

impl RewriteOutcome {
    fn unchanged(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Default::default()
        }
    }
}

/// The rewrite engine
///
/// Holds the global switches and the whitelist; providers are passed per
/// call. `apply` is synchronous and has no side effects beyond its return
/// value.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    settings: EngineConfig,
    whitelist: WhitelistMatcher,
}

impl RuleEngine {
    pub fn new(settings: EngineConfig, whitelist: WhitelistMatcher) -> Self {
        Self {
            settings,
            whitelist,
        }
    }

    pub fn settings(&self) -> &EngineConfig {
        &self.settings
    }

    pub fn whitelist(&self) -> &WhitelistMatcher {
        &self.whitelist
    }

    pub fn whitelist_mut(&mut self) -> &mut WhitelistMatcher {
        &mut self.whitelist
    }

    /// Rewrites `url` according to `provider`
    ///
    /// Steps run in order and each one can end the evaluation: whitelist,
    /// local host, redirection, complete-provider block, raw rules, then
    /// parameter rules.
    pub fn apply(&self, provider: &Provider, url: &str, meta: &RequestMeta) -> RewriteOutcome {
        let mut log = LogRecorder::new(self.settings.logging, provider, meta);

        if self.whitelist.is_whitelisted(url, &meta.context_urls) {
            tracing::debug!("Whitelisted request: {}", url);
            log.record(url, url, WHITELIST_RULE);
            return RewriteOutcome {
                whitelisted: true,
                log: log.finish(),
                ..RewriteOutcome::unchanged(url)
            };
        }

        if self.settings.skip_local_hosts
            && extract_host(url).is_some_and(|host| is_local_host(&host))
        {
            tracing::trace!("Skipping local host: {}", url);
            return RewriteOutcome::unchanged(url);
        }

        if let Some((rule, target)) = provider.redirection(url) {
            tracing::debug!("Provider '{}' redirects {} -> {}", provider.name(), url, target);
            log.record(url, &target, &rule);
            return RewriteOutcome {
                changed: target != url,
                redirect: true,
                url: target,
                log: log.finish(),
                ..Default::default()
            };
        }

        if provider.is_complete_provider() && self.settings.domain_blocking {
            tracing::debug!("Provider '{}' blocks {}", provider.name(), url);
            log.record(url, url, BLOCK_RULE);
            return RewriteOutcome {
                cancel: true,
                log: log.finish(),
                ..RewriteOutcome::unchanged(url)
            };
        }

        let mut current = url.to_string();
        let mut rewritten = false;
        for (rule, regex) in provider.raw_rules().active() {
            let stripped = regex.replace_all(&current, "");
            if stripped != current {
                let stripped = stripped.into_owned();
                log.record(&current, &stripped, rule);
                current = stripped;
                rewritten = true;
            }
        }

        let mut parts = UrlParts::parse(&current);
        let referral = self
            .settings
            .referral_marketing
            .then(|| provider.referral_marketing().active())
            .into_iter()
            .flatten();
        for (rule, regex) in provider.rules().active().chain(referral) {
            let before = parts.clone();
            let removed = parts.remove_params(|key| regex.is_match(key));
            if removed.is_empty() {
                continue;
            }
            rewritten = true;
            if log.enabled() {
                log.record(&before.assemble(), &parts.assemble(), rule);
            }
        }
        // Reassembly drops a `?` or `#` left with nothing after it.
        if rewritten {
            current = parts.assemble();
        }

        RewriteOutcome {
            changed: current != url,
            url: current,
            log: log.finish(),
            ..Default::default()
        }
    }
}

/// Collects log entries for one `apply` call
struct LogRecorder<'a> {
    enabled: bool,
    provider: &'a Provider,
    meta: &'a RequestMeta,
    entries: Vec<LogEntry>,
}

impl<'a> LogRecorder<'a> {
    fn new(enabled: bool, provider: &'a Provider, meta: &'a RequestMeta) -> Self {
        Self {
            enabled,
            provider,
            meta,
            entries: Vec::new(),
        }
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn record(&mut self, before: &str, after: &str, rule: &str) {
        if !self.enabled {
            return;
        }
        self.entries.push(LogEntry {
            before: before.to_string(),
            after: after.to_string(),
            rule: rule.to_string(),
            provider_name: self.provider.name().to_string(),
            pattern_type: self.provider.pattern_type().to_string(),
            pattern_value: self.provider.pattern_value(),
            request_method: self.meta.method.clone(),
            provider_methods: self.provider.methods(),
            request_type: self.meta.resource_type.clone(),
            provider_resource_types: self.provider.resource_types(),
            timestamp: Utc::now().timestamp_millis(),
        });
    }

    fn finish(self) -> Vec<LogEntry> {
        self.entries
    }
}
