//! Structured hostname matching for `||host` pattern anchors

use crate::pattern::suffix::SuffixResolver;

/// Outcome of a matcher that may be unable to decide
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// The matcher decided
    Matched(bool),
    /// The matcher cannot decide; the caller falls back to a coarser matcher
    Undecided,
}

/// A parsed host expression such as `example.com`, `*.example.com`,
/// `example.*` or `*.example.*`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPattern {
    base: String,
    subdomains_only: bool,
    any_tld: bool,
}

impl HostPattern {
    /// Parses a host expression
    ///
    /// Returns `None` when the expression is not simple: characters other
    /// than letters, digits, `.`, `-` and `*`, or a wildcard anywhere but the
    /// leading `*.` / trailing `.*` positions.
    pub fn parse(expr: &str) -> Option<Self> {
        if expr.is_empty() || !is_simple_host_expr(expr) {
            return None;
        }

        let lowered = expr.to_lowercase();
        let (subdomains_only, rest) = match lowered.strip_prefix("*.") {
            Some(rest) => (true, rest),
            None => (false, lowered.as_str()),
        };
        let (any_tld, base) = match rest.strip_suffix(".*") {
            Some(base) => (true, base),
            None => (false, rest),
        };

        if base.is_empty() || base.contains('*') || base.starts_with('.') || base.ends_with('.') {
            return None;
        }

        Some(Self {
            base: base.to_string(),
            subdomains_only,
            any_tld,
        })
    }

    /// The host expression without wildcards
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Matches a lowercase hostname
    ///
    /// Any-TLD expressions need the suffix resolver; without one, or when
    /// the host's suffix is unknown, the outcome is `Undecided`.
    pub fn matches(&self, host: &str, resolver: Option<&dyn SuffixResolver>) -> MatchOutcome {
        let host = host.trim_end_matches('.');

        if !self.any_tld {
            let subdomain = is_strict_subdomain(host, &self.base);
            let matched = if self.subdomains_only {
                subdomain
            } else {
                host == self.base || subdomain
            };
            return MatchOutcome::Matched(matched);
        }

        let Some(resolver) = resolver else {
            return MatchOutcome::Undecided;
        };
        let Some(split) = resolver.split(host) else {
            return MatchOutcome::Undecided;
        };
        let Some(stripped) = host
            .strip_suffix(split.tld.as_str())
            .and_then(|h| h.strip_suffix('.'))
        else {
            // The host is a bare public suffix.
            return MatchOutcome::Matched(false);
        };

        let matched = if self.subdomains_only {
            is_strict_subdomain(stripped, &self.base)
        } else {
            stripped == self.base
                || stripped
                    .strip_prefix("www.")
                    .is_some_and(|rest| rest == self.base)
        };
        MatchOutcome::Matched(matched)
    }
}

/// True when the expression only uses hostname characters and `*`
pub fn is_simple_host_expr(expr: &str) -> bool {
    expr.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '*')
}

fn is_strict_subdomain(host: &str, base: &str) -> bool {
    host.len() > base.len() + 1
        && host.ends_with(base)
        && host.as_bytes()[host.len() - base.len() - 1] == b'.'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::SuffixSet;

    fn suffixes() -> SuffixSet {
        SuffixSet::new(["com", "de", "uk", "co.uk", "org"])
    }

    fn check(expr: &str, host: &str) -> MatchOutcome {
        let set = suffixes();
        HostPattern::parse(expr)
            .unwrap()
            .matches(host, Some(&set as &dyn SuffixResolver))
    }

    #[test]
    fn test_exact_and_subdomains() {
        assert_eq!(check("example.com", "example.com"), MatchOutcome::Matched(true));
        assert_eq!(check("example.com", "ads.example.com"), MatchOutcome::Matched(true));
        assert_eq!(check("example.com", "a.b.example.com"), MatchOutcome::Matched(true));
        assert_eq!(check("example.com", "notexample.com"), MatchOutcome::Matched(false));
        assert_eq!(check("example.com", "example.org"), MatchOutcome::Matched(false));
    }

    #[test]
    fn test_leading_wildcard_excludes_apex() {
        assert_eq!(check("*.example.com", "example.com"), MatchOutcome::Matched(false));
        assert_eq!(check("*.example.com", "cdn.example.com"), MatchOutcome::Matched(true));
    }

    #[test]
    fn test_any_tld() {
        assert_eq!(check("example.*", "example.co.uk"), MatchOutcome::Matched(true));
        assert_eq!(check("example.*", "www.example.de"), MatchOutcome::Matched(true));
        assert_eq!(check("example.*", "notexample.com"), MatchOutcome::Matched(false));
        assert_eq!(check("example.*", "shop.example.com"), MatchOutcome::Matched(false));
        assert_eq!(check("example.*", "co.uk"), MatchOutcome::Matched(false));
    }

    #[test]
    fn test_any_tld_subdomains_only() {
        assert_eq!(check("*.example.*", "shop.example.de"), MatchOutcome::Matched(true));
        assert_eq!(check("*.example.*", "example.de"), MatchOutcome::Matched(false));
    }

    #[test]
    fn test_any_tld_without_resolver_is_undecided() {
        let pattern = HostPattern::parse("example.*").unwrap();
        assert_eq!(pattern.matches("example.com", None), MatchOutcome::Undecided);
        assert_eq!(check("example.*", "example.internal"), MatchOutcome::Undecided);
    }

    #[test]
    fn test_parse_rejects_complex_expressions() {
        assert!(HostPattern::parse("ex*ample.com").is_none());
        assert!(HostPattern::parse("example.com:8080").is_none());
        assert!(HostPattern::parse("").is_none());
        assert!(HostPattern::parse("*.").is_none());
    }
}
