//! Public suffix resolution
//!
//! Any-TLD patterns (`example.*`) need to know where the registrable part of
//! a hostname ends. That knowledge lives behind [`SuffixResolver`] so the
//! matcher can run with the full public suffix list in production and a
//! handful of suffixes in tests.

use crate::ScrubError;
use publicsuffix::{List, Psl};
use std::collections::HashSet;
use std::path::Path;

/// A hostname split at its public suffix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSplit {
    /// The public suffix, e.g. `co.uk`
    pub tld: String,
    /// The registrable domain (eTLD+1), e.g. `example.co.uk`
    pub domain: Option<String>,
    /// Everything left of the registrable domain, e.g. `www`
    pub subdomain: Option<String>,
}

impl HostSplit {
    /// Builds a split from a host and the suffix found for it
    fn from_suffix(host: &str, tld: &str) -> Option<Self> {
        if host == tld {
            return Some(Self {
                tld: tld.to_string(),
                domain: None,
                subdomain: None,
            });
        }

        let head = host.strip_suffix(tld)?.strip_suffix('.')?;
        let (subdomain, label) = match head.rsplit_once('.') {
            Some((sub, label)) => (Some(sub.to_string()), label),
            None => (None, head),
        };

        Some(Self {
            tld: tld.to_string(),
            domain: Some(format!("{}.{}", label, tld)),
            subdomain,
        })
    }
}

/// Resolves the public suffix of a hostname
pub trait SuffixResolver: Send + Sync {
    /// Splits a lowercase hostname, or returns `None` when its suffix is unknown
    fn split(&self, host: &str) -> Option<HostSplit>;
}

/// Resolver backed by the Mozilla public suffix list
pub struct PublicSuffixList {
    list: List,
}

impl PublicSuffixList {
    /// Loads a `public_suffix_list.dat` file
    pub fn from_path(path: &Path) -> Result<Self, ScrubError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parses public suffix list content
    pub fn parse(content: &str) -> Result<Self, ScrubError> {
        let list: List = content
            .parse()
            .map_err(|e: publicsuffix::Error| ScrubError::SuffixList(e.to_string()))?;
        Ok(Self { list })
    }
}

impl SuffixResolver for PublicSuffixList {
    fn split(&self, host: &str) -> Option<HostSplit> {
        let suffix = self.list.suffix(host.as_bytes())?;
        if !suffix.is_known() {
            return None;
        }
        let tld = std::str::from_utf8(suffix.as_bytes()).ok()?;
        HostSplit::from_suffix(host, tld)
    }
}

/// Resolver over a fixed set of suffixes, longest match wins
#[derive(Debug, Clone, Default)]
pub struct SuffixSet {
    suffixes: HashSet<String>,
}

impl SuffixSet {
    pub fn new<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            suffixes: suffixes.into_iter().map(Into::into).collect(),
        }
    }
}

impl SuffixResolver for SuffixSet {
    fn split(&self, host: &str) -> Option<HostSplit> {
        // Walk from the longest candidate suffix to the shortest.
        let mut candidate = host;
        loop {
            if self.suffixes.contains(candidate) {
                return HostSplit::from_suffix(host, candidate);
            }
            candidate = candidate.split_once('.')?.1;
        }
    }
}
