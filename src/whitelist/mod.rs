//! Whitelist handling
//!
//! A request bypasses rewriting when its own host, or the host of any URL in
//! its context (tab, frame ancestors, referer, initiator), matches a
//! whitelist entry.

mod context;

pub use context::{FrameTree, MAX_FRAME_DEPTH, MAX_TRACKED_TABS};

use crate::config::validate_whitelist_entry;
use crate::pattern::SuffixResolver;
use crate::url::{extract_host, matches_whitelist_entry};
use crate::ConfigError;
use std::fmt;
use std::sync::Arc;

/// Matches URLs against the user's whitelist
#[derive(Clone, Default)]
pub struct WhitelistMatcher {
    entries: Vec<String>,
    resolver: Option<Arc<dyn SuffixResolver>>,
}

impl fmt::Debug for WhitelistMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WhitelistMatcher")
            .field("entries", &self.entries)
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

impl WhitelistMatcher {
    /// Builds a matcher, normalizing entries to lowercase and dropping
    /// invalid or duplicate ones
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut matcher = Self::default();
        for entry in entries {
            if let Err(e) = matcher.add(entry.as_ref()) {
                tracing::warn!("Ignoring whitelist entry: {}", e);
            }
        }
        matcher
    }

    /// Uses `resolver` to find the public suffix for `example.*` entries
    pub fn with_resolver(mut self, resolver: Option<Arc<dyn SuffixResolver>>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Adds an entry; returns `Ok(false)` when it was already present
    pub fn add(&mut self, entry: &str) -> Result<bool, ConfigError> {
        let entry = entry.trim().to_lowercase();
        validate_whitelist_entry(&entry)?;
        if self.entries.contains(&entry) {
            return Ok(false);
        }
        self.entries.push(entry);
        Ok(true)
    }

    /// Removes an entry; returns whether it was present
    pub fn remove(&mut self, entry: &str) -> bool {
        let entry = entry.trim().to_lowercase();
        let before = self.entries.len();
        self.entries.retain(|e| *e != entry);
        self.entries.len() != before
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Checks a bare hostname
    pub fn is_host_whitelisted(&self, host: &str) -> bool {
        let host = host.to_lowercase();
        self.entries
            .iter()
            .any(|entry| matches_whitelist_entry(entry, &host, self.resolver.as_deref()))
    }

    /// Checks a request URL together with its context URLs
    pub fn is_whitelisted<S: AsRef<str>>(&self, url: &str, context_urls: &[S]) -> bool {
        if self.entries.is_empty() {
            return false;
        }

        std::iter::once(url)
            .chain(context_urls.iter().map(|u| u.as_ref()))
            .filter_map(extract_host)
            .any(|host| self.is_host_whitelisted(&host))
    }
}
