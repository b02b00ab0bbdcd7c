//! Domain-pattern compiler with a per-instance cache

use crate::pattern::host::{HostPattern, MatchOutcome};
use crate::pattern::suffix::SuffixResolver;
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use url::{Position, Url};

/// Regex for a `||` anchor: scheme, then optionally any subdomain labels
const DOMAIN_ANCHOR: &str = r"^[a-z][a-z0-9+.\-]*://(?:[^/?#]*\.)?";

/// Regex for a `^` separator: a non-word character or the end of input
const SEPARATOR: &str = r"(?:[^0-9a-z_\-.%]|$)";

/// Characters that make a path suffix a pattern rather than a literal prefix
const PATTERN_METACHARS: &[char] = &['*', '^', '|'];

/// Compiles and caches domain patterns
///
/// A pattern string is compiled once and reused for the lifetime of the
/// compiler. The compiler is shared by every provider built from the same
/// rule set.
pub struct PatternCompiler {
    cache: RwLock<HashMap<String, Arc<CompiledPattern>>>,
    resolver: Option<Arc<dyn SuffixResolver>>,
}

#[derive(Debug)]
enum CompiledPattern {
    /// `||host...` with a structurally matchable host expression
    Anchored {
        host: HostPattern,
        rest: RestMatcher,
        fallback: Matcher,
    },
    Generic(Matcher),
}

#[derive(Debug)]
enum Matcher {
    Regex(Regex),
    Substring(String),
}

impl Matcher {
    fn compile(pattern: &str) -> Self {
        match build_regex(&pattern_to_regex(pattern)) {
            Ok(regex) => Matcher::Regex(regex),
            Err(e) => {
                tracing::warn!("Pattern '{}' failed to compile ({}), using substring match", pattern, e);
                Matcher::Substring(pattern.to_lowercase())
            }
        }
    }

    fn is_match(&self, lowered_url: &str) -> bool {
        match self {
            Matcher::Regex(regex) => regex.is_match(lowered_url),
            Matcher::Substring(needle) => lowered_url.contains(needle.as_str()),
        }
    }
}

/// Matcher for whatever follows the host expression
#[derive(Debug)]
enum RestMatcher {
    Any,
    Prefix(String),
    Regex(Regex),
}

impl RestMatcher {
    fn compile(rest: &str) -> Option<Self> {
        if rest.is_empty() {
            return Some(RestMatcher::Any);
        }
        if !rest.contains(PATTERN_METACHARS) {
            return Some(RestMatcher::Prefix(rest.to_lowercase()));
        }
        let regex = format!("^{}", translate_tokens(rest, false));
        build_regex(&regex).ok().map(RestMatcher::Regex)
    }

    fn is_match(&self, rest: &str) -> bool {
        match self {
            RestMatcher::Any => true,
            RestMatcher::Prefix(prefix) => rest.starts_with(prefix.as_str()),
            RestMatcher::Regex(regex) => regex.is_match(rest),
        }
    }
}

impl PatternCompiler {
    /// Creates a compiler; any-TLD patterns need a resolver to be matched
    /// structurally
    pub fn new(resolver: Option<Arc<dyn SuffixResolver>>) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            resolver,
        }
    }

    /// The suffix resolver, shared with the whitelist
    pub fn resolver(&self) -> Option<Arc<dyn SuffixResolver>> {
        self.resolver.clone()
    }

    /// Tests a full URL against a domain pattern
    pub fn matches(&self, pattern: &str, url: &str) -> bool {
        let lowered = url.to_lowercase();
        let compiled = self.compile(pattern);

        match compiled.as_ref() {
            CompiledPattern::Generic(matcher) => matcher.is_match(&lowered),
            CompiledPattern::Anchored {
                host,
                rest,
                fallback,
            } => match self.match_anchored(host, rest, &lowered) {
                MatchOutcome::Matched(matched) => matched,
                MatchOutcome::Undecided => fallback.is_match(&lowered),
            },
        }
    }

    /// Tests a bare hostname against a domain pattern's host expression
    ///
    /// Patterns that are not of the `||host` form are tested against
    /// `https://<host>/`.
    pub fn matches_host(&self, pattern: &str, host: &str) -> bool {
        self.matches(pattern, &format!("https://{}/", host))
    }

    /// Number of distinct patterns compiled so far
    pub fn cached_len(&self) -> usize {
        self.cache.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn compile(&self, pattern: &str) -> Arc<CompiledPattern> {
        if let Some(hit) = self
            .cache
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(pattern)
        {
            tracing::trace!("Pattern cache hit: {}", pattern);
            return Arc::clone(hit);
        }

        let compiled = Arc::new(compile_pattern(pattern));
        self.cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(pattern.to_string())
            .or_insert_with(|| Arc::clone(&compiled));
        compiled
    }

    fn match_anchored(&self, host: &HostPattern, rest: &RestMatcher, lowered: &str) -> MatchOutcome {
        let Ok(parsed) = Url::parse(lowered) else {
            return MatchOutcome::Undecided;
        };
        let Some(candidate) = parsed.host_str() else {
            return MatchOutcome::Undecided;
        };

        match host.matches(candidate, self.resolver.as_deref()) {
            MatchOutcome::Matched(true) => {
                MatchOutcome::Matched(rest.is_match(&parsed[Position::BeforePath..]))
            }
            other => other,
        }
    }
}

impl Default for PatternCompiler {
    fn default() -> Self {
        Self::new(None)
    }
}

fn compile_pattern(pattern: &str) -> CompiledPattern {
    if let Some(body) = pattern.strip_prefix("||") {
        let end = body.find(['/', '^', '|']).unwrap_or(body.len());
        let (host_expr, rest) = body.split_at(end);

        if let (Some(host), Some(rest)) = (HostPattern::parse(host_expr), RestMatcher::compile(rest)) {
            return CompiledPattern::Anchored {
                host,
                rest,
                fallback: Matcher::compile(pattern),
            };
        }
    }

    CompiledPattern::Generic(Matcher::compile(pattern))
}

/// Translates an adblock-style pattern into a regular expression
///
/// # Examples
///
/// ```
/// use linkscrub::pattern::pattern_to_regex;
///
/// assert_eq!(pattern_to_regex("|https://a.b/*"), r"^https://a\.b/.*");
/// ```
pub fn pattern_to_regex(pattern: &str) -> String {
    match pattern.strip_prefix("||") {
        Some(body) => format!("{}{}", DOMAIN_ANCHOR, translate_tokens(body, false)),
        None => translate_tokens(pattern, true),
    }
}

fn translate_tokens(pattern: &str, allow_start_anchor: bool) -> String {
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut literal = String::new();
    let last = pattern.chars().count().saturating_sub(1);

    for (i, c) in pattern.chars().enumerate() {
        let token = match c {
            '*' => ".*",
            '^' => SEPARATOR,
            '|' if i == 0 && allow_start_anchor => "^",
            '|' if i == last => "$",
            _ => {
                literal.push(c);
                continue;
            }
        };
        out.push_str(&regex::escape(&literal));
        literal.clear();
        out.push_str(token);
    }
    out.push_str(&regex::escape(&literal));
    out
}

fn build_regex(source: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(source).case_insensitive(true).build()
}
