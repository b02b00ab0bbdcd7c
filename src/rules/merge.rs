//! Merging of base and custom rule sets
//!
//! Providers are grouped by the identity key of the pattern they target.
//! A group with one member survives verbatim; a group with several members
//! is folded into one provider. Custom groups replace base groups with the
//! same key outright.

use crate::provider::{ProviderData, RuleFile, RuleMetadata};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Counts from one merge, for diagnostics only
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Base providers considered after filtering
    pub bundled: usize,
    /// Custom providers considered after filtering
    pub custom: usize,
    /// Base providers replaced by a custom provider
    pub overridden: usize,
    /// Providers dropped because the user disabled them
    pub disabled: usize,
    /// Providers in the merged set
    pub total: usize,
}

/// Persisted form of the disabled-provider signatures
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DisabledSignatures {
    Flat(Vec<String>),
    BySource(BTreeMap<String, Vec<String>>),
}

/// Parses a disabled-signature document
///
/// Accepts either an array of identity keys or an object mapping a source
/// name to such an array. Anything else yields no signatures.
///
/// # Examples
///
/// ```
/// use linkscrub::rules::parse_disabled_signatures;
///
/// assert_eq!(parse_disabled_signatures(r#"["url:a"]"#), vec!["url:a"]);
/// assert_eq!(
///     parse_disabled_signatures(r#"{"bundled":["url:a"],"custom":["url:b","url:a"]}"#),
///     vec!["url:a", "url:b"]
/// );
/// ```
pub fn parse_disabled_signatures(json: &str) -> Vec<String> {
    let signatures = match serde_json::from_str::<DisabledSignatures>(json) {
        Ok(DisabledSignatures::Flat(list)) => list,
        Ok(DisabledSignatures::BySource(map)) => map.into_values().flatten().collect(),
        Err(e) => {
            tracing::warn!("Ignoring malformed disabled-provider list: {}", e);
            Vec::new()
        }
    };

    let mut seen = HashSet::new();
    signatures
        .into_iter()
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

/// A provider awaiting grouping
#[derive(Debug, Clone)]
struct Candidate {
    name: String,
    data: ProviderData,
    /// Custom and remote sources are primary; bundled ones are not
    primary: bool,
}

impl Candidate {
    fn group_key(&self, index: usize) -> String {
        if self.data.has_pattern() {
            self.data.identity_key(&self.name)
        } else {
            // Pattern-less providers never merge with anything.
            format!("no-pattern:{}:{}", index, self.name)
        }
    }
}

/// Merges rule sets according to the user's disabled-provider list
#[derive(Debug, Clone, Default)]
pub struct ProviderMerger {
    disabled: HashSet<String>,
}

impl ProviderMerger {
    pub fn new<I, S>(disabled: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            disabled: disabled.into_iter().map(Into::into).collect(),
        }
    }

    /// Merges a base rule set with the user's custom rules
    pub fn merge(&self, base: &RuleFile, custom: &RuleFile) -> (RuleFile, MergeStats) {
        let mut stats = MergeStats::default();

        let base = self.filter_disabled(base, false, &mut stats.disabled);
        let custom = self.filter_disabled(custom, true, &mut stats.disabled);
        stats.bundled = base.len();
        stats.custom = custom.len();

        let custom_keys: HashSet<String> = custom
            .iter()
            .filter(|c| c.data.has_pattern())
            .map(|c| c.data.identity_key(&c.name))
            .collect();
        let base: Vec<Candidate> = base
            .into_iter()
            .filter(|c| {
                let overridden = c.data.has_pattern()
                    && custom_keys.contains(&c.data.identity_key(&c.name));
                if overridden {
                    tracing::debug!("Custom rules override base provider '{}'", c.name);
                    stats.overridden += 1;
                }
                !overridden
            })
            .collect();

        // Custom groups come first so they win pattern claims.
        let candidates: Vec<Candidate> = custom.into_iter().chain(base).collect();
        let merged = claim_domain_patterns(fold_groups(candidates));
        let providers = assign_names(merged);

        stats.total = providers.len();
        let merged = RuleFile {
            metadata: RuleMetadata {
                provider_count: Some(providers.len()),
                ..Default::default()
            },
            providers,
        };
        (merged, stats)
    }

    /// Combines several primary rule sets, such as multiple verified remote
    /// sources, into one
    pub fn combine(files: &[RuleFile]) -> RuleFile {
        let candidates: Vec<Candidate> = files
            .iter()
            .flat_map(|file| {
                file.providers.iter().map(|(name, data)| Candidate {
                    name: name.clone(),
                    data: data.clone(),
                    primary: true,
                })
            })
            .collect();

        let providers = assign_names(fold_groups(candidates));
        RuleFile {
            metadata: files.first().map(|f| f.metadata.clone()).unwrap_or_default(),
            providers,
        }
    }

    fn filter_disabled(&self, file: &RuleFile, primary: bool, disabled: &mut usize) -> Vec<Candidate> {
        file.providers
            .iter()
            .filter(|(name, data)| {
                let off = self.disabled.contains(&data.identity_key(name));
                if off {
                    tracing::debug!("Provider '{}' is disabled", name);
                    *disabled += 1;
                }
                !off
            })
            .map(|(name, data)| Candidate {
                name: name.clone(),
                data: data.clone(),
                primary,
            })
            .collect()
    }
}

/// Groups candidates by identity key, in order of first appearance, and
/// folds each group into one named provider
fn fold_groups(candidates: Vec<Candidate>) -> Vec<(String, ProviderData)> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<Candidate>> = HashMap::new();

    for (index, candidate) in candidates.into_iter().enumerate() {
        let key = candidate.group_key(index);
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(candidate);
    }

    order
        .into_iter()
        .filter_map(|key| groups.remove(&key))
        .map(|mut members| {
            if members.len() == 1 {
                let only = members.remove(0);
                return (only.name, only.data);
            }
            let data = fold_members(&members);
            (merged_name(&members, &data), data)
        })
        .collect()
}

/// Unions list fields (deduplicated, in member order) and ORs the flags
fn fold_members(members: &[Candidate]) -> ProviderData {
    let mut merged = ProviderData::default();

    for member in members {
        let data = &member.data;
        if merged.url_pattern().is_none() {
            merged.url_pattern = data.url_pattern().map(str::to_string);
        }
        union(&mut merged.domain_patterns, &data.domain_patterns);
        union(&mut merged.rules, &data.rules);
        union(&mut merged.raw_rules, &data.raw_rules);
        union(&mut merged.referral_marketing, &data.referral_marketing);
        union(&mut merged.exceptions, &data.exceptions);
        union(&mut merged.domain_exceptions, &data.domain_exceptions);
        union(&mut merged.redirections, &data.redirections);
        union(&mut merged.domain_redirections, &data.domain_redirections);
        union(&mut merged.methods, &data.methods);
        union(&mut merged.resource_types, &data.resource_types);
        merged.complete_provider |= data.complete_provider;
        merged.force_redirection |= data.force_redirection;
    }

    merged
}

fn union(target: &mut Vec<String>, values: &[String]) {
    for value in values {
        if !target.contains(value) {
            target.push(value.clone());
        }
    }
}

/// Keeps each domain pattern on the first provider listing it, dropping
/// providers that lose every pattern
fn claim_domain_patterns(providers: Vec<(String, ProviderData)>) -> Vec<(String, ProviderData)> {
    let mut claimed: HashSet<String> = HashSet::new();

    providers
        .into_iter()
        .filter_map(|(name, mut data)| {
            if data.domain_patterns.is_empty() {
                return Some((name, data));
            }
            data.domain_patterns.retain(|p| claimed.insert(p.clone()));
            if data.has_pattern() {
                Some((name, data))
            } else {
                tracing::debug!("Dropping provider '{}': all domain patterns claimed", name);
                None
            }
        })
        .collect()
}

/// Resolves name collisions with `_1`, `_2`, ... suffixes
fn assign_names(providers: Vec<(String, ProviderData)>) -> BTreeMap<String, ProviderData> {
    let mut named = BTreeMap::new();

    for (name, data) in providers {
        let mut unique = name.clone();
        let mut suffix = 1;
        while named.contains_key(&unique) {
            unique = format!("{}_{}", name, suffix);
            suffix += 1;
        }
        named.insert(unique, data);
    }

    named
}

/// Chooses a name for a provider merged from several members
fn merged_name(members: &[Candidate], data: &ProviderData) -> String {
    if let Some(name) = data.url_pattern().and_then(name_from_url_pattern) {
        return name;
    }
    if let Some(name) = name_from_domain_patterns(&data.domain_patterns) {
        return name;
    }
    if let Some(primary) = members.iter().find(|m| m.primary) {
        return primary.name.clone();
    }
    members
        .iter()
        .map(|m| m.name.as_str())
        .min_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
        .unwrap_or_default()
        .to_string()
}

/// Pulls the first domain-like token out of a URL regex
fn name_from_url_pattern(pattern: &str) -> Option<String> {
    let mut stripped = String::with_capacity(pattern.len());
    let mut in_class = false;
    let mut in_repeat = false;
    for c in pattern.to_lowercase().chars() {
        match c {
            '[' => in_class = true,
            ']' => in_class = false,
            '{' => in_repeat = true,
            '}' => in_repeat = false,
            _ if in_class || in_repeat => {}
            _ => stripped.push(c),
        }
    }

    let stripped = ["https?", "http(s)?", "https", "http", "www"]
        .iter()
        .fold(stripped, |s, boilerplate| s.replace(boilerplate, " "))
        .replace("\\.", ".");

    stripped
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '.' || c == '-'))
        .map(|token| token.trim_matches(|c| c == '.' || c == '-'))
        .find(|token| token.len() >= 2 && token.chars().any(|c| c.is_ascii_alphabetic()))
        .map(str::to_string)
}

/// Host of the shortest domain pattern without wildcards
fn name_from_domain_patterns(patterns: &[String]) -> Option<String> {
    patterns
        .iter()
        .filter(|p| !p.contains('*'))
        .filter_map(|p| {
            let body = p.trim_start_matches('|');
            let body = body.split_once("://").map_or(body, |(_, rest)| rest);
            let end = body.find(['/', '^', '|', '$', '?']).unwrap_or(body.len());
            let host = body[..end].trim_matches('.').to_lowercase();
            (!host.is_empty()).then_some(host)
        })
        .min_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
}
