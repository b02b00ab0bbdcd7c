//! Pattern matching for provider domain/URL patterns
//!
//! Providers select the URLs they govern either with a full regular
//! expression (`urlPattern`) or with a list of adblock-style domain patterns
//! (`domainPatterns`). This module compiles the latter:
//!
//! - `||host^path` anchors at a domain boundary. Simple host expressions are
//!   matched structurally, including the `*.` subdomain and `.*` any-TLD
//!   wildcards, the latter resolved through a [`SuffixResolver`].
//! - `|` anchors at the start or end of the URL.
//! - `^` matches a separator character or the end of the URL.
//! - `*` matches anything.
//!
//! Matching never fails: a pattern the structured matcher cannot decide is
//! compiled generically, and a pattern that cannot be compiled is tested as a
//! plain substring.

mod compiler;
mod host;
mod suffix;

pub use compiler::{pattern_to_regex, PatternCompiler};
pub use host::{HostPattern, MatchOutcome};
pub use suffix::{HostSplit, PublicSuffixList, SuffixResolver, SuffixSet};
