use crate::{UrlError, UrlResult};
use ipnet::IpNet;
use std::net::IpAddr;
use std::sync::OnceLock;
use url::Url;

/// Networks whose hosts are never rewritten
const LOCAL_NETWORKS: &[&str] = &[
    "0.0.0.0/8",
    "10.0.0.0/8",
    "100.64.0.0/10",
    "127.0.0.0/8",
    "169.254.0.0/16",
    "172.16.0.0/12",
    "192.168.0.0/16",
    "::1/128",
    "fc00::/7",
    "fe80::/10",
];

/// Extracts the lowercase host from a URL string
///
/// IPv6 hosts are returned without brackets and a trailing root dot is
/// dropped.
///
/// # Examples
///
/// ```
/// use linkscrub::url::extract_host;
///
/// assert_eq!(extract_host("https://EXAMPLE.COM/path"), Some("example.com".to_string()));
/// assert_eq!(extract_host("https://[::1]:8080/"), Some("::1".to_string()));
/// assert_eq!(extract_host("not a url"), None);
/// ```
pub fn extract_host(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let host = host
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim_end_matches('.');
    if host.is_empty() {
        return None;
    }
    Some(host.to_lowercase())
}

/// Parses a URL the interceptor can act on
///
/// Only `http` and `https` URLs with a host are accepted.
///
/// # Examples
///
/// ```
/// use linkscrub::url::parse_web_url;
///
/// assert!(parse_web_url("https://example.com/?a=1").is_ok());
/// assert!(parse_web_url("ftp://example.com/").is_err());
/// assert!(parse_web_url("nonsense").is_err());
/// ```
pub fn parse_web_url(url: &str) -> UrlResult<Url> {
    let parsed = Url::parse(url).map_err(|e| UrlError::Parse(e.to_string()))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(UrlError::InvalidScheme(parsed.scheme().to_string()));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    Ok(parsed)
}

fn local_networks() -> &'static [IpNet] {
    static NETWORKS: OnceLock<Vec<IpNet>> = OnceLock::new();
    NETWORKS.get_or_init(|| {
        LOCAL_NETWORKS
            .iter()
            .filter_map(|cidr| cidr.parse().ok())
            .collect()
    })
}

/// Checks whether a host is loopback, private or link-local
///
/// Only literal addresses and the `localhost` names are recognized; no DNS
/// resolution happens on this path.
pub fn is_local_host(host: &str) -> bool {
    let host = host.trim_start_matches('[').trim_end_matches(']');

    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    let Ok(addr) = host.parse::<IpAddr>() else {
        return false;
    };

    let addr = match addr {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map(IpAddr::V4)
            .unwrap_or(IpAddr::V6(v6)),
        v4 => v4,
    };

    local_networks().iter().any(|net| net.contains(&addr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_host() {
        assert_eq!(
            extract_host("https://blog.example.com/post"),
            Some("blog.example.com".to_string())
        );
    }

    #[test]
    fn test_extract_with_port_and_query() {
        assert_eq!(
            extract_host("https://example.com:8080/path?query=value#frag"),
            Some("example.com".to_string())
        );
    }

    #[test]
    fn test_extract_trailing_dot() {
        assert_eq!(
            extract_host("https://example.com./"),
            Some("example.com".to_string())
        );
    }

    #[test]
    fn test_parse_web_url_rejects_other_schemes() {
        assert!(matches!(
            parse_web_url("mailto:someone@example.com"),
            Err(UrlError::InvalidScheme(_))
        ));
        assert!(matches!(parse_web_url("not a url"), Err(UrlError::Parse(_))));
        assert_eq!(
            parse_web_url("HTTP://Example.com/a").unwrap().host_str(),
            Some("example.com")
        );
    }

    #[test]
    fn test_extract_no_host() {
        assert_eq!(extract_host("data:text/plain,hello"), None);
    }

    #[test]
    fn test_local_hosts() {
        assert!(is_local_host("localhost"));
        assert!(is_local_host("app.localhost"));
        assert!(is_local_host("127.0.0.1"));
        assert!(is_local_host("10.1.2.3"));
        assert!(is_local_host("172.20.0.1"));
        assert!(is_local_host("192.168.1.10"));
        assert!(is_local_host("169.254.3.4"));
        assert!(is_local_host("::1"));
        assert!(is_local_host("[fe80::1]"));
        assert!(is_local_host("fd12:3456::1"));
        assert!(is_local_host("::ffff:192.168.0.1"));
    }

    #[test]
    fn test_public_hosts() {
        assert!(!is_local_host("example.com"));
        assert!(!is_local_host("8.8.8.8"));
        assert!(!is_local_host("172.32.0.1"));
        assert!(!is_local_host("2001:4860:4860::8888"));
    }
}
