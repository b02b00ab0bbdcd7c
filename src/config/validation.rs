use crate::config::types::{Config, EngineConfig, LogConfig, RemoteSource, RulesConfig};
use crate::config::HARD_LOG_CEILING;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_rules_config(&config.rules)?;
    validate_engine_config(&config.engine)?;
    validate_log_config(&config.log)?;

    if config.storage.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates rule acquisition configuration
fn validate_rules_config(config: &RulesConfig) -> Result<(), ConfigError> {
    if config.fetch_timeout_secs < 1 || config.fetch_timeout_secs > 120 {
        return Err(ConfigError::Validation(format!(
            "fetch_timeout_secs must be between 1 and 120, got {}",
            config.fetch_timeout_secs
        )));
    }

    if config.bundled_path.is_empty() {
        return Err(ConfigError::Validation(
            "bundled_path cannot be empty".to_string(),
        ));
    }

    for source in &config.remote {
        validate_remote_source(source)?;
    }

    Ok(())
}

/// Validates one remote source: both documents are required, both over HTTPS
///
/// A source without a hash document is rejected rather than fetched
/// unverified.
pub fn validate_remote_source(source: &RemoteSource) -> Result<(), ConfigError> {
    if source.hash_url.trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "Remote source '{}' has no hash URL",
            source.rule_url
        )));
    }

    for raw in [&source.rule_url, &source.hash_url] {
        let url = Url::parse(raw)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid remote URL '{}': {}", raw, e)))?;

        if url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "Remote URL '{}' must use HTTPS scheme",
                raw
            )));
        }
    }

    Ok(())
}

/// Validates rewrite engine configuration
fn validate_engine_config(config: &EngineConfig) -> Result<(), ConfigError> {
    for resource_type in &config.resource_types {
        if resource_type.is_empty()
            || !resource_type
                .chars()
                .all(|c| c.is_ascii_lowercase() || c == '_')
        {
            return Err(ConfigError::Validation(format!(
                "Invalid resource type '{}'",
                resource_type
            )));
        }
    }
    Ok(())
}

/// Validates log configuration
fn validate_log_config(config: &LogConfig) -> Result<(), ConfigError> {
    if config.limit < 1 || config.limit > HARD_LOG_CEILING {
        return Err(ConfigError::Validation(format!(
            "log limit must be between 1 and {}, got {}",
            HARD_LOG_CEILING, config.limit
        )));
    }
    Ok(())
}

/// Validates a whitelist entry
///
/// Accepted forms: `example.com`, `*.example.com`, `example.*`,
/// `www.example.*` and `*.example.*`. Entries must already be lowercase.
pub fn validate_whitelist_entry(entry: &str) -> Result<(), ConfigError> {
    let mut domain = entry.strip_prefix("*.").unwrap_or(entry);
    let any_tld = domain.ends_with(".*");
    if any_tld {
        domain = &domain[..domain.len() - 2];
    }

    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Whitelist entry cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Whitelist entry '{}' contains invalid characters",
            entry
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Whitelist entry '{}' cannot start or end with '.' or '-'",
            entry
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Whitelist entry '{}' cannot contain consecutive dots",
            entry
        )));
    }

    // Without the any-TLD suffix, a bare label like "localhost" is only
    // meaningful as an exact host.
    if !any_tld && entry.starts_with("*.") && !domain.contains('.') {
        return Err(ConfigError::InvalidPattern(format!(
            "Whitelist entry '{}' must name a domain with a TLD",
            entry
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(rule_url: &str, hash_url: &str) -> RemoteSource {
        RemoteSource {
            rule_url: rule_url.to_string(),
            hash_url: hash_url.to_string(),
        }
    }

    #[test]
    fn test_validate_remote_source() {
        assert!(validate_remote_source(&source(
            "https://example.org/rules.json",
            "https://example.org/rules.hash"
        ))
        .is_ok());

        assert!(validate_remote_source(&source(
            "http://example.org/rules.json",
            "https://example.org/rules.hash"
        ))
        .is_err());
        assert!(validate_remote_source(&source(
            "https://example.org/rules.json",
            "http://example.org/rules.hash"
        ))
        .is_err());
        assert!(validate_remote_source(&source("https://example.org/rules.json", "")).is_err());
        assert!(validate_remote_source(&source("not a url", "https://example.org/h")).is_err());
    }

    #[test]
    fn test_validate_whitelist_entry() {
        assert!(validate_whitelist_entry("example.com").is_ok());
        assert!(validate_whitelist_entry("*.example.com").is_ok());
        assert!(validate_whitelist_entry("example.*").is_ok());
        assert!(validate_whitelist_entry("*.example.*").is_ok());
        assert!(validate_whitelist_entry("localhost").is_ok());

        assert!(validate_whitelist_entry("").is_err());
        assert!(validate_whitelist_entry("*.").is_err());
        assert!(validate_whitelist_entry("Example.com").is_err());
        assert!(validate_whitelist_entry(".example.com").is_err());
        assert!(validate_whitelist_entry("example..com").is_err());
        assert!(validate_whitelist_entry("exa mple.com").is_err());
        assert!(validate_whitelist_entry("*.localhost").is_err());
    }

    #[test]
    fn test_log_limit_bounds() {
        let mut config = Config::default();
        config.log.limit = 0;
        assert!(validate(&config).is_err());

        config.log.limit = HARD_LOG_CEILING + 1;
        assert!(validate(&config).is_err());

        config.log.limit = HARD_LOG_CEILING;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_resource_type() {
        let mut config = Config::default();
        config.engine.resource_types = vec!["Main Frame".to_string()];
        assert!(validate(&config).is_err());
    }
}
