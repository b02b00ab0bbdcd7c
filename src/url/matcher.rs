use crate::pattern::SuffixResolver;

/// Checks if a host matches a whitelist entry
///
/// This function supports four forms of entry:
/// 1. Plain: "example.com" matches "example.com" and every subdomain
/// 2. Subdomain wildcard: "*.example.com" matches subdomains but not the apex
/// 3. Any-TLD: "example.*" matches "example.<tld>" and "www.example.<tld>"
/// 4. Subdomain any-TLD: "*.example.*" matches "<sub>.example.<tld>"
///
/// For the any-TLD forms only the host's public suffix is stripped. With a
/// resolver that suffix comes from the resolver. Without one, or when the
/// resolver does not know the host, the suffix is the last label, or the
/// last two when the second-level label is short (`co.uk`, `com.au`).
///
/// # Arguments
///
/// * `entry` - The whitelist entry (lowercase)
/// * `host` - The lowercase host to check
/// * `resolver` - Optional public suffix resolver for the any-TLD forms
///
/// # Examples
///
/// ```
/// use linkscrub::url::matches_whitelist_entry;
///
/// assert!(matches_whitelist_entry("example.com", "ads.example.com", None));
/// assert!(!matches_whitelist_entry("example.com", "exampleads.com", None));
/// assert!(matches_whitelist_entry("example.*", "www.example.co.uk", None));
/// assert!(!matches_whitelist_entry("example.*", "example.com.evil.net", None));
/// assert!(!matches_whitelist_entry("*.example.com", "example.com", None));
/// ```
pub fn matches_whitelist_entry(
    entry: &str,
    host: &str,
    resolver: Option<&dyn SuffixResolver>,
) -> bool {
    let host = host.trim_end_matches('.');
    if entry.is_empty() || host.is_empty() {
        return false;
    }

    let (subdomains_only, rest) = match entry.strip_prefix("*.") {
        Some(rest) => (true, rest),
        None => (false, entry),
    };

    if let Some(base) = rest.strip_suffix(".*") {
        return suffix_candidates(host, resolver).into_iter().any(|head| {
            if subdomains_only {
                head.strip_suffix(base)
                    .and_then(|sub| sub.strip_suffix('.'))
                    .is_some_and(|sub| !sub.is_empty())
            } else {
                head == base || head.strip_prefix("www.") == Some(base)
            }
        });
    }

    let subdomain = host.len() > rest.len() && host.ends_with(&format!(".{}", rest));
    if subdomains_only {
        subdomain
    } else {
        host == rest || subdomain
    }
}

/// Longest second-level label treated as part of a public suffix when no
/// resolver is available
const SHORT_SECOND_LEVEL: usize = 3;

/// The host with its public suffix removed
///
/// Yields one head when the suffix is known, and up to two when it is
/// guessed from the trailing labels.
fn suffix_candidates<'a>(host: &'a str, resolver: Option<&dyn SuffixResolver>) -> Vec<&'a str> {
    if let Some(split) = resolver.and_then(|r| r.split(host)) {
        return host
            .strip_suffix(split.tld.as_str())
            .and_then(|head| head.strip_suffix('.'))
            .filter(|head| !head.is_empty())
            .into_iter()
            .collect();
    }

    let mut heads = Vec::new();
    let Some((head, _tld)) = host.rsplit_once('.') else {
        return heads;
    };
    heads.push(head);
    if let Some((shorter, second_level)) = head.rsplit_once('.') {
        if second_level.len() <= SHORT_SECOND_LEVEL {
            heads.push(shorter);
        }
    }
    heads.retain(|head| !head.is_empty());
    heads
}
