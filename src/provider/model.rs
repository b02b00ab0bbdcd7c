//! Rule file data model
//!
//! The same JSON shape is used by bundled, remote, cached and custom rule
//! sources:
//!
//! ```json
//! { "metadata": { "name": "...", "version": "..." },
//!   "providers": { "amazon": { "urlPattern": "...", "rules": ["tag"] } } }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Serialized form of one provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain_patterns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw_rules: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub referral_marketing: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exceptions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain_exceptions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub redirections: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain_redirections: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_types: Vec<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub complete_provider: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub force_redirection: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl ProviderData {
    /// The URL pattern, if present and non-empty
    pub fn url_pattern(&self) -> Option<&str> {
        self.url_pattern.as_deref().filter(|p| !p.is_empty())
    }

    /// Whether the provider can match anything at all
    pub fn has_pattern(&self) -> bool {
        self.url_pattern().is_some() || !self.domain_patterns.is_empty()
    }

    /// Key identifying the URLs a provider targets
    ///
    /// Two providers with the same key govern the same URLs and are merged.
    ///
    /// # Examples
    ///
    /// ```
    /// use linkscrub::provider::ProviderData;
    ///
    /// let data = ProviderData {
    ///     domain_patterns: vec!["||b.com".into(), "||a.com".into(), "||b.com".into()],
    ///     ..Default::default()
    /// };
    /// assert_eq!(data.identity_key("x"), "domain:||a.com||||b.com");
    /// assert_eq!(ProviderData::default().identity_key("x"), "no-pattern:x");
    /// ```
    pub fn identity_key(&self, name: &str) -> String {
        if let Some(pattern) = self.url_pattern() {
            return format!("url:{}", pattern);
        }
        if !self.domain_patterns.is_empty() {
            let mut patterns: Vec<&str> = self.domain_patterns.iter().map(String::as_str).collect();
            patterns.sort_unstable();
            patterns.dedup();
            return format!("domain:{}", patterns.join("||"));
        }
        format!("no-pattern:{}", name)
    }
}

/// Rule file metadata; unknown keys are preserved
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, rename = "sourceURL", skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_count: Option<usize>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A complete rule document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleFile {
    #[serde(default)]
    pub metadata: RuleMetadata,
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderData>,
}

impl RuleFile {
    /// Parses a rule document, skipping malformed providers
    ///
    /// A document that is not a JSON object with a `providers` object
    /// yields an empty rule file.
    pub fn parse_lenient(json: &str) -> RuleFile {
        match serde_json::from_str::<Value>(json) {
            Ok(value) => Self::from_value(value),
            Err(e) => {
                tracing::warn!("Rule document is not valid JSON: {}", e);
                RuleFile::default()
            }
        }
    }

    /// Builds a rule file from an already-parsed JSON value
    pub fn from_value(value: Value) -> RuleFile {
        let Value::Object(mut root) = value else {
            tracing::warn!("Rule document is not a JSON object");
            return RuleFile::default();
        };

        let metadata = root
            .remove("metadata")
            .and_then(|m| serde_json::from_value(m).ok())
            .unwrap_or_default();

        let mut providers = BTreeMap::new();
        if let Some(Value::Object(entries)) = root.remove("providers") {
            for (name, data) in entries {
                match serde_json::from_value::<ProviderData>(data) {
                    Ok(provider) => {
                        providers.insert(name, provider);
                    }
                    Err(e) => tracing::warn!("Skipping malformed provider '{}': {}", name, e),
                }
            }
        }

        RuleFile {
            metadata,
            providers,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Serializes the rule file; object keys come out sorted
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&serde_json::to_value(self)?)
    }
}
