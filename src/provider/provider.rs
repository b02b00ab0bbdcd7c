//! In-memory providers

use crate::pattern::PatternCompiler;
use crate::provider::model::{ProviderData, RuleFile};
use crate::url::{decode_until_stable, ensure_scheme, UrlParts};
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;
use std::sync::Arc;

/// Separator between a domain redirection's pattern and its target
const REDIRECT_OPTION: &str = "$redirect=";

/// URL no real provider targets; a URL pattern matching it is a catch-all
const CATCH_ALL_PROBE: &str = "https://linkscrub.invalid/";

/// An ordered set of rules, each either active or inactive
///
/// Adding a rule that is already present only updates its active flag, so
/// a rule is never both active and inactive.
#[derive(Debug, Clone)]
pub struct RuleSet<T> {
    entries: Vec<RuleEntry<T>>,
    index: HashMap<String, usize>,
}

#[derive(Debug, Clone)]
struct RuleEntry<T> {
    source: String,
    value: T,
    active: bool,
}

impl<T> Default for RuleSet<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T> RuleSet<T> {
    /// Inserts a rule or updates its active flag
    pub fn insert(&mut self, source: &str, value: T, active: bool) {
        match self.index.get(source) {
            Some(&i) => self.entries[i].active = active,
            None => {
                self.index.insert(source.to_string(), self.entries.len());
                self.entries.push(RuleEntry {
                    source: source.to_string(),
                    value,
                    active,
                });
            }
        }
    }

    /// Sets the active flag of an existing rule; returns whether it exists
    pub fn set_active(&mut self, source: &str, active: bool) -> bool {
        match self.index.get(source) {
            Some(&i) => {
                self.entries[i].active = active;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, source: &str) -> bool {
        self.index.contains_key(source)
    }

    pub fn is_active(&self, source: &str) -> bool {
        self.index
            .get(source)
            .is_some_and(|&i| self.entries[i].active)
    }

    /// Active rules in insertion order
    pub fn active(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries
            .iter()
            .filter(|e| e.active)
            .map(|e| (e.source.as_str(), &e.value))
    }

    /// Sources of the active rules
    pub fn active_sources(&self) -> Vec<String> {
        self.active().map(|(source, _)| source.to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One named rule provider
pub struct Provider {
    name: String,
    url_pattern: Option<(String, Regex)>,
    domain_patterns: RuleSet<()>,
    rules: RuleSet<Regex>,
    raw_rules: RuleSet<Regex>,
    referral_marketing: RuleSet<Regex>,
    exceptions: RuleSet<Regex>,
    domain_exceptions: RuleSet<()>,
    redirections: RuleSet<Regex>,
    domain_redirections: RuleSet<(String, String)>,
    methods: RuleSet<()>,
    resource_types: RuleSet<()>,
    complete_provider: bool,
    force_redirection: bool,
    compiler: Arc<PatternCompiler>,
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name)
            .field("pattern", &self.pattern_value())
            .field("rules", &self.rules.len())
            .field("complete_provider", &self.complete_provider)
            .finish()
    }
}

impl Provider {
    /// Creates an empty provider
    pub fn new(name: &str, compiler: Arc<PatternCompiler>) -> Self {
        Self {
            name: name.to_string(),
            url_pattern: None,
            domain_patterns: RuleSet::default(),
            rules: RuleSet::default(),
            raw_rules: RuleSet::default(),
            referral_marketing: RuleSet::default(),
            exceptions: RuleSet::default(),
            domain_exceptions: RuleSet::default(),
            redirections: RuleSet::default(),
            domain_redirections: RuleSet::default(),
            methods: RuleSet::default(),
            resource_types: RuleSet::default(),
            complete_provider: false,
            force_redirection: false,
            compiler,
        }
    }

    /// Builds a provider from its serialized form
    ///
    /// Rules whose regex does not compile are skipped.
    pub fn from_data(name: &str, data: &ProviderData, compiler: Arc<PatternCompiler>) -> Self {
        let mut provider = Self::new(name, compiler);

        if let Some(pattern) = data.url_pattern() {
            provider.set_url_pattern(pattern);
        }
        for pattern in &data.domain_patterns {
            provider.add_domain_pattern(pattern, true);
        }
        if data.complete_provider {
            provider.set_complete_provider(true);
        }
        provider.force_redirection = data.force_redirection;

        for rule in &data.rules {
            provider.add_rule(rule, true);
        }
        for rule in &data.raw_rules {
            provider.add_raw_rule(rule, true);
        }
        for rule in &data.referral_marketing {
            provider.add_referral_marketing(rule, true);
        }
        for exception in &data.exceptions {
            provider.add_exception(exception, true);
        }
        for exception in &data.domain_exceptions {
            provider.add_domain_exception(exception, true);
        }
        for redirection in &data.redirections {
            provider.add_redirection(redirection, true);
        }
        for redirection in &data.domain_redirections {
            provider.add_domain_redirection(redirection, true);
        }
        for method in &data.methods {
            provider.add_method(method, true);
        }
        for resource_type in &data.resource_types {
            provider.add_resource_type(resource_type, true);
        }

        provider
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_complete_provider(&self) -> bool {
        self.complete_provider
    }

    pub fn should_force_redirect(&self) -> bool {
        self.force_redirection
    }

    pub fn rules(&self) -> &RuleSet<Regex> {
        &self.rules
    }

    pub fn raw_rules(&self) -> &RuleSet<Regex> {
        &self.raw_rules
    }

    pub fn referral_marketing(&self) -> &RuleSet<Regex> {
        &self.referral_marketing
    }

    /// Active method filters
    pub fn methods(&self) -> Vec<String> {
        self.methods.active_sources()
    }

    /// Active resource-type filters
    pub fn resource_types(&self) -> Vec<String> {
        self.resource_types.active_sources()
    }

    /// `urlPattern` or `domainPatterns`, for log entries
    pub fn pattern_type(&self) -> &'static str {
        if self.url_pattern.is_some() {
            "urlPattern"
        } else {
            "domainPatterns"
        }
    }

    /// The governing pattern(s), for log entries
    pub fn pattern_value(&self) -> String {
        match &self.url_pattern {
            Some((source, _)) => source.clone(),
            None => self.domain_patterns.active_sources().join(", "),
        }
    }

    /// Whether the URL pattern matches every URL
    pub fn is_catch_all(&self) -> bool {
        self.url_pattern
            .as_ref()
            .is_some_and(|(_, regex)| regex.is_match(CATCH_ALL_PROBE))
    }

    // ===== Mutators =====

    pub fn set_url_pattern(&mut self, pattern: &str) {
        match compile_rule(pattern) {
            Some(regex) => self.url_pattern = Some((pattern.to_string(), regex)),
            None => tracing::warn!("Provider '{}' has an invalid urlPattern", self.name),
        }
    }

    /// Marks the provider as a full-URL blocker; its rules then cover
    /// every parameter
    pub fn set_complete_provider(&mut self, complete: bool) {
        self.complete_provider = complete;
        if complete {
            self.add_rule(".*", true);
        }
    }

    pub fn set_force_redirection(&mut self, force: bool) {
        self.force_redirection = force;
    }

    pub fn add_domain_pattern(&mut self, pattern: &str, active: bool) {
        self.domain_patterns.insert(pattern, (), active);
    }

    pub fn add_rule(&mut self, rule: &str, active: bool) {
        add_regex(&mut self.rules, rule, &anchored(rule), active, &self.name);
    }

    pub fn add_raw_rule(&mut self, rule: &str, active: bool) {
        add_regex(&mut self.raw_rules, rule, rule, active, &self.name);
    }

    pub fn add_referral_marketing(&mut self, rule: &str, active: bool) {
        add_regex(&mut self.referral_marketing, rule, &anchored(rule), active, &self.name);
    }

    pub fn add_exception(&mut self, exception: &str, active: bool) {
        add_regex(&mut self.exceptions, exception, exception, active, &self.name);
    }

    pub fn add_domain_exception(&mut self, pattern: &str, active: bool) {
        self.domain_exceptions.insert(pattern, (), active);
    }

    pub fn add_redirection(&mut self, redirection: &str, active: bool) {
        add_regex(&mut self.redirections, redirection, redirection, active, &self.name);
    }

    /// Adds a `pattern$redirect=target` entry
    pub fn add_domain_redirection(&mut self, entry: &str, active: bool) {
        let Some((pattern, target)) = entry.rsplit_once(REDIRECT_OPTION) else {
            tracing::warn!(
                "Provider '{}': domain redirection '{}' has no {} option",
                self.name,
                entry,
                REDIRECT_OPTION
            );
            return;
        };
        if pattern.is_empty() || target.is_empty() {
            return;
        }
        self.domain_redirections
            .insert(entry, (pattern.to_string(), target.to_string()), active);
    }

    pub fn add_method(&mut self, method: &str, active: bool) {
        self.methods.insert(&method.to_uppercase(), (), active);
    }

    pub fn add_resource_type(&mut self, resource_type: &str, active: bool) {
        self.resource_types
            .insert(&resource_type.to_lowercase(), (), active);
    }

    // ===== Matching =====

    /// Whether this provider governs the URL
    pub fn match_url(&self, url: &str) -> bool {
        let matched = match &self.url_pattern {
            Some((_, regex)) => regex.is_match(url),
            None => self
                .domain_patterns
                .active()
                .any(|(pattern, _)| self.compiler.matches(pattern, url)),
        };
        matched && !self.match_exception(url)
    }

    /// Whether an exception vetoes the URL
    pub fn match_exception(&self, url: &str) -> bool {
        self.exceptions.active().any(|(_, regex)| regex.is_match(url))
            || self
                .domain_exceptions
                .active()
                .any(|(pattern, _)| self.compiler.matches(pattern, url))
    }

    /// Whether the request method passes the method filter
    pub fn match_method(&self, method: &str) -> bool {
        self.methods.active().next().is_none() || self.methods.is_active(&method.to_uppercase())
    }

    /// Whether the resource type passes the provider's filter, or the global
    /// allow-list when the provider has none
    pub fn match_resource_type(&self, resource_type: &str, global: &[String]) -> bool {
        let resource_type = resource_type.to_lowercase();
        if self.resource_types.active().next().is_none() {
            return global.is_empty() || global.iter().any(|t| *t == resource_type);
        }
        self.resource_types.is_active(&resource_type)
    }

    /// Finds the redirect target hidden in the URL
    ///
    /// Returns the responsible rule and the decoded, scheme-qualified target.
    /// Regex redirections are tried before domain redirections; the first
    /// match wins.
    pub fn redirection(&self, url: &str) -> Option<(String, String)> {
        for (source, regex) in self.redirections.active() {
            let Some(target) = regex
                .captures(url)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str())
                .filter(|t| !t.is_empty())
            else {
                continue;
            };
            return Some((source.to_string(), ensure_scheme(&decode_until_stable(target))));
        }

        for (source, (pattern, target)) in self.domain_redirections.active() {
            if !self.compiler.matches(pattern, url) {
                continue;
            }
            if let Some(destination) = resolve_redirect_target(url, target) {
                return Some((source.to_string(), destination));
            }
        }

        None
    }
}

/// Resolves a domain redirection target
///
/// A target that looks like a URL is used as-is; otherwise it names the
/// query or fragment parameter carrying the destination.
fn resolve_redirect_target(url: &str, target: &str) -> Option<String> {
    if target.contains("://") || target.starts_with("//") {
        return Some(ensure_scheme(&decode_until_stable(target)));
    }

    let removed = UrlParts::parse(url).remove_params(|key| key.eq_ignore_ascii_case(target));
    let value = removed
        .iter()
        .filter_map(|segment| segment.split_once('=').map(|(_, v)| v))
        .find(|v| !v.is_empty())?;
    Some(ensure_scheme(&decode_until_stable(value)))
}

fn anchored(rule: &str) -> String {
    format!("^(?:{})$", rule)
}

fn compile_rule(source: &str) -> Option<Regex> {
    RegexBuilder::new(source).case_insensitive(true).build().ok()
}

fn add_regex(set: &mut RuleSet<Regex>, source: &str, regex: &str, active: bool, provider: &str) {
    if set.set_active(source, active) {
        return;
    }
    match compile_rule(regex) {
        Some(compiled) => set.insert(source, compiled, active),
        None => tracing::warn!("Provider '{}': skipping invalid rule '{}'", provider, source),
    }
}

/// The providers of one resolved rule set, in scan order
#[derive(Debug, Default)]
pub struct ProviderList {
    providers: Vec<Provider>,
}

impl ProviderList {
    /// Builds providers from a rule file
    ///
    /// Scan order is fixed by two keys. Providers whose URL pattern matches
    /// every URL come last. Within each group providers are ordered by name,
    /// so when two specific providers target the same URL the one whose name
    /// sorts first handles it. Names are unique after merging, which makes
    /// the order independent of source and fetch order.
    pub fn from_rule_file(rules: &RuleFile, compiler: Arc<PatternCompiler>) -> Self {
        let mut providers: Vec<Provider> = rules
            .providers
            .iter()
            .map(|(name, data)| Provider::from_data(name, data, Arc::clone(&compiler)))
            .collect();
        providers.sort_by_key(|p| p.is_catch_all());
        Self { providers }
    }

    pub fn new(providers: Vec<Provider>) -> Self {
        Self { providers }
    }

    /// The first provider that matches the URL and passes its method and
    /// resource-type filters
    pub fn find(
        &self,
        url: &str,
        method: &str,
        resource_type: &str,
        global_types: &[String],
    ) -> Option<&Provider> {
        self.providers.iter().find(|p| {
            p.match_method(method)
                && p.match_resource_type(resource_type, global_types)
                && p.match_url(url)
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Provider> {
        self.providers.iter()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
