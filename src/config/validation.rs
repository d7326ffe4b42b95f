use crate::config::types::{
    AssetsConfig, CleanupConfig, Config, OutputConfig, RendererConfig, RetryConfig, SiteConfig,
};
use crate::ConfigError;
use lol_html::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_output_config(&config.output)?;
    validate_renderer_config(&config.renderer)?;
    validate_retry_config(&config.retry)?;
    validate_assets_config(&config.assets)?;
    validate_cleanup_config(&config.cleanup)?;

    if config.network.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "network timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates the source/mirror origins and the language code
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    validate_origin("source-origin", &config.source_origin)?;
    validate_origin("mirror-origin", &config.mirror_origin)?;

    if config.language.is_empty() {
        return Err(ConfigError::Validation(
            "language cannot be empty".to_string(),
        ));
    }

    if !config
        .language
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "language must contain only alphanumeric characters and hyphens, got '{}'",
            config.language
        )));
    }

    if config.source_origin_trimmed() == config.mirror_origin_trimmed() {
        return Err(ConfigError::Validation(
            "mirror-origin must differ from source-origin".to_string(),
        ));
    }

    Ok(())
}

/// An origin is an http(s) URL with a host and no path, query or fragment
fn validate_origin(field: &str, origin: &str) -> Result<(), ConfigError> {
    let url = Url::parse(origin)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, origin, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must use http or https",
            field, origin
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' has no host",
            field, origin
        )));
    }

    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must be a bare origin without path or query",
            field, origin
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.root_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "root-dir cannot be empty".to_string(),
        ));
    }

    if config.database_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.assets_dir.is_empty() || config.assets_dir.contains(['/', '\\']) {
        return Err(ConfigError::Validation(format!(
            "assets-dir must be a single directory name, got '{}'",
            config.assets_dir
        )));
    }

    Ok(())
}

fn validate_renderer_config(config: &RendererConfig) -> Result<(), ConfigError> {
    Url::parse(&config.endpoint).map_err(|e| {
        ConfigError::InvalidUrl(format!(
            "Invalid renderer endpoint '{}': {}",
            config.endpoint, e
        ))
    })?;

    if config.page_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "page-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 || config.max_attempts > 20 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be between 1 and 20, got {}",
            config.max_attempts
        )));
    }

    Ok(())
}

fn validate_assets_config(config: &AssetsConfig) -> Result<(), ConfigError> {
    for host in &config.cdn_hosts {
        validate_domain_pattern(host)?;
    }

    for origin in &config.fallback_origins {
        let url = Url::parse(origin).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid fallback origin '{}': {}", origin, e))
        })?;
        if !origin.ends_with('/') || url.query().is_some() {
            return Err(ConfigError::Validation(format!(
                "fallback origin '{}' must end with '/' and carry no query",
                origin
            )));
        }
    }

    for canonical in &config.canonical_names {
        if canonical.prefix.is_empty() || canonical.name.is_empty() {
            return Err(ConfigError::Validation(
                "canonical-names entries need a non-empty prefix and name".to_string(),
            ));
        }
        if canonical.name.contains(['/', '\\']) || canonical.name == ".." {
            return Err(ConfigError::Validation(format!(
                "canonical name '{}' must be a plain file name",
                canonical.name
            )));
        }
    }

    Ok(())
}

fn validate_cleanup_config(config: &CleanupConfig) -> Result<(), ConfigError> {
    for selector in &config.remove_selectors {
        selector.parse::<Selector>().map_err(|e| {
            ConfigError::Validation(format!("Invalid selector '{}': {}", selector, e))
        })?;
    }
    Ok(())
}

/// Validates a domain pattern (supports wildcards)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    if let Some(domain) = pattern.strip_prefix("*.") {
        validate_domain_string(domain)?;
    } else {
        validate_domain_string(pattern)?;
    }

    Ok(())
}

/// Validates a domain string (without wildcard prefix)
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' must contain at least one dot (e.g., 'example.com')",
            domain
        )));
    }

    Ok(())
}
