//! Built-in emergency rules, used only when no other tier is usable

use crate::provider::{ProviderData, RuleFile, RuleMetadata};

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// The emergency rule set: global UTM and click-id stripping plus Amazon
/// and Google providers
pub fn emergency_rules() -> RuleFile {
    let mut rules = RuleFile {
        metadata: RuleMetadata {
            name: Some("emergency".to_string()),
            source: Some("builtin".to_string()),
            ..Default::default()
        },
        ..Default::default()
    };

    rules.providers.insert(
        "globalRules".to_string(),
        ProviderData {
            url_pattern: Some(".*".to_string()),
            rules: strings(&[
                "utm_[a-z_]*",
                "fbclid",
                "gclid",
                "dclid",
                "gclsrc",
                "msclkid",
                "yclid",
                "mc_eid",
                "_hsenc",
                "_hsmi",
            ]),
            exceptions: strings(&[
                r"^https?://(?:[a-z0-9-]+\.)*?google(?:\.[a-z]{2,}){1,}/recaptcha/",
                r"^https?://accounts\.google\.com",
            ]),
            ..Default::default()
        },
    );

    rules.providers.insert(
        "amazon".to_string(),
        ProviderData {
            url_pattern: Some(r"^https?://(?:[a-z0-9-]+\.)*?amazon(?:\.[a-z]{2,}){1,}".to_string()),
            rules: strings(&[
                "p[fd]_rd_[a-z]*",
                "qid",
                "srs?",
                "__mk_[a-z]{1,3}_[a-z]{1,3}",
                "spIA",
                "ms3_c",
                "[a-z%0-9]*ie",
                "refRID",
                "colii?d",
                "qualifier",
                "_encoding",
                "smid",
                "field-lbr_brands_browse-bin",
                "ref_?",
                "th",
                "sprefix",
                "crid",
                "keywords",
                "cv_ct_[a-z]+",
                "linkCode",
                "creativeASIN",
                "ascsu?bid",
                "ascsu?bt",
                "ascsu?btype",
                "psc",
                "content-id",
            ]),
            raw_rules: strings(&[r"/ref=[^/?]*"]),
            referral_marketing: strings(&["tag", "ascsubtag"]),
            exceptions: strings(&[
                r"^https?://(?:[a-z0-9-]+\.)*?amazon(?:\.[a-z]{2,}){1,}/gp/.*?(?:redirector\.html|cart|your-account|buy|ap/signin)",
            ]),
            ..Default::default()
        },
    );

    rules.providers.insert(
        "google".to_string(),
        ProviderData {
            url_pattern: Some(r"^https?://(?:[a-z0-9-]+\.)*?google(?:\.[a-z]{2,}){1,}".to_string()),
            rules: strings(&[
                "ved",
                "bi[a-z]*",
                "gfe_[a-z]*",
                "ei",
                "source",
                "gs_[a-z]*",
                "site",
                "oq",
                "esrc",
                "uact",
                "cd",
                "cad",
                "gws_[a-z]*",
                "atyp",
                "vet",
                "zx",
                "_u",
                "je",
                "dcr",
                "ie",
                "sei",
                "sa",
                "dpr",
                "btn[a-z]*",
                "usg",
                "aqs",
                "sourceid",
                "sxsrf",
                "rlz",
                "pcampaignid",
                "sca_esv",
            ]),
            exceptions: strings(&[
                r"^https?://mail\.google\.com/mail/u/",
                r"^https?://accounts\.google(?:\.[a-z]{2,}){1,}",
                r"^https?://(?:docs|accounts)\.google(?:\.[a-z]{2,}){1,}",
                r"^https?://(?:[a-z0-9-]+\.)*?google(?:\.[a-z]{2,}){1,}/recaptcha/",
            ]),
            redirections: strings(&[
                r"^https?://(?:[a-z0-9-]+\.)*?google(?:\.[a-z]{2,}){1,}/url\?.*?(?:url|q)=(https?[^&]+)",
            ]),
            ..Default::default()
        },
    );

    rules.metadata.provider_count = Some(rules.providers.len());
    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PatternCompiler;
    use crate::provider::{ProviderList, RequestMeta, RuleEngine};
    use std::sync::Arc;

    #[test]
    fn test_emergency_rules_shape() {
        let rules = emergency_rules();
        assert_eq!(rules.len(), 3);
        assert!(rules.providers.values().all(ProviderData::has_pattern));
        assert_eq!(rules.metadata.provider_count, Some(3));
    }

    #[test]
    fn test_emergency_rules_strip_utm() {
        let list = ProviderList::from_rule_file(&emergency_rules(), Arc::new(PatternCompiler::default()));
        let url = "https://news.example/article?id=7&utm_source=x&utm_medium=y&fbclid=z";
        let provider = list.find(url, "GET", "main_frame", &[]).unwrap();
        assert_eq!(provider.name(), "globalRules");

        let outcome = RuleEngine::default().apply(provider, url, &RequestMeta::new("GET", "main_frame"));
        assert_eq!(outcome.url, "https://news.example/article?id=7");
    }

    #[test]
    fn test_emergency_rules_google_redirect() {
        let list = ProviderList::from_rule_file(&emergency_rules(), Arc::new(PatternCompiler::default()));
        let url = "https://www.google.com/url?sa=t&url=https%3A%2F%2Fdest.org%2F&usg=abc";
        let provider = list.find(url, "GET", "main_frame", &[]).unwrap();
        assert_eq!(provider.name(), "google");

        let outcome = RuleEngine::default().apply(provider, url, &RequestMeta::new("GET", "main_frame"));
        assert!(outcome.redirect);
        assert_eq!(outcome.url, "https://dest.org/");
    }
}
