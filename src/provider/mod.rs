//! Providers and the rewrite engine

mod engine;
mod model;
#[allow(clippy::module_inception)]
mod provider;

pub use engine::{LogEntry, RequestMeta, RewriteOutcome, RuleEngine, BLOCK_RULE, WHITELIST_RULE};
pub use model::{ProviderData, RuleFile, RuleMetadata};
pub use provider::{Provider, ProviderList, RuleSet};
