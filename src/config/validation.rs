use crate::config::types::{
    Config, CrawlerConfig, HeuristicsConfig, OutputConfig, SeedEntry, UserAgentConfig,
    VCardConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_vcard_config(&config.vcard)?;
    validate_heuristics(&config.heuristics)?;
    validate_output_config(&config.output)?;
    validate_seeds(&config.seeds)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_requests < 1 || config.max_concurrent_requests > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_requests must be between 1 and 100, got {}",
            config.max_concurrent_requests
        )));
    }

    if config.per_domain_burst < 1 || config.per_domain_burst > 8 {
        return Err(ConfigError::Validation(format!(
            "per_domain_burst must be between 1 and 8, got {}",
            config.per_domain_burst
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }

    if config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be <= 10, got {}",
            config.max_retries
        )));
    }

    if config.max_pages_per_site < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages_per_site must be >= 1, got {}",
            config.max_pages_per_site
        )));
    }

    if config.max_crawl_delay_secs > 3600 {
        return Err(ConfigError::Validation(format!(
            "max_crawl_delay_secs must be <= 3600, got {}",
            config.max_crawl_delay_secs
        )));
    }

    if config.max_page_bytes < 1024 {
        return Err(ConfigError::Validation(format!(
            "max_page_bytes must be >= 1024, got {}",
            config.max_page_bytes
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_vcard_config(config: &VCardConfig) -> Result<(), ConfigError> {
    if config.max_bytes == 0 {
        return Err(ConfigError::Validation(
            "vcard max_bytes must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_heuristics(config: &HeuristicsConfig) -> Result<(), ConfigError> {
    if config.profile_path_segments.iter().any(|s| s.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "profile_path_segments cannot contain empty entries".to_string(),
        ));
    }

    if config
        .generic_email_prefixes
        .iter()
        .any(|p| p.trim().is_empty() || p.contains('@'))
    {
        return Err(ConfigError::Validation(
            "generic_email_prefixes must be bare local-parts (no '@', no empty entries)"
                .to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.summary_path.is_empty() {
        return Err(ConfigError::Validation(
            "summary_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates seed entries
///
/// Seeds may also come from the command line, so an empty list is accepted
/// here and rejected later if nothing else supplies seeds.
fn validate_seeds(seeds: &[SeedEntry]) -> Result<(), ConfigError> {
    for seed in seeds {
        let url = Url::parse(&seed.url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed.url, e)))?;

        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use HTTP or HTTPS",
                seed.url
            )));
        }

        if url.host_str().is_none() {
            return Err(ConfigError::InvalidUrl(format!(
                "Seed URL '{}' has no host",
                seed.url
            )));
        }
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("admin@sub.example.com").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user@domain").is_err());
    }

    #[test]
    fn test_validate_crawler_bounds() {
        let mut config = CrawlerConfig::default();
        assert!(validate_crawler_config(&config).is_ok());

        config.max_concurrent_requests = 0;
        assert!(validate_crawler_config(&config).is_err());

        config.max_concurrent_requests = 4;
        config.per_domain_burst = 0;
        assert!(validate_crawler_config(&config).is_err());

        config.per_domain_burst = 2;
        config.max_pages_per_site = 0;
        assert!(validate_crawler_config(&config).is_err());

        config.max_pages_per_site = 10;
        config.max_crawl_delay_secs = 86_400;
        assert!(validate_crawler_config(&config).is_err());

        config.max_crawl_delay_secs = 30;
        config.max_page_bytes = 10;
        assert!(validate_crawler_config(&config).is_err());

        config.max_page_bytes = 1024;
        assert!(validate_crawler_config(&config).is_ok());
    }

    #[test]
    fn test_validate_seeds() {
        let ok = SeedEntry {
            url: "https://firm.example/".to_string(),
            practice_area: None,
            location_filters: vec![],
        };
        assert!(validate_seeds(&[ok]).is_ok());

        let ftp = SeedEntry {
            url: "ftp://firm.example/".to_string(),
            practice_area: None,
            location_filters: vec![],
        };
        assert!(validate_seeds(&[ftp]).is_err());

        let junk = SeedEntry {
            url: "not a url".to_string(),
            practice_area: None,
            location_filters: vec![],
        };
        assert!(matches!(
            validate_seeds(&[junk]),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_validate_heuristics_rejects_full_addresses() {
        let mut heuristics = HeuristicsConfig::default();
        assert!(validate_heuristics(&heuristics).is_ok());

        heuristics
            .generic_email_prefixes
            .push("info@firm.com".to_string());
        assert!(validate_heuristics(&heuristics).is_err());
    }
}
