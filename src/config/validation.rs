use crate::config::types::{Config, CrawlerConfig, PodConfig, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_pod_config(&config.pods)?;
    Ok(())
}

/// Validates crawler configuration.
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.data_dir.is_empty() {
        return Err(ConfigError::Validation(
            "data_dir cannot be empty".to_string(),
        ));
    }

    if config.seed_file.is_empty() {
        return Err(ConfigError::Validation(
            "seed_file cannot be empty".to_string(),
        ));
    }

    if config.max_workers < 1 {
        return Err(ConfigError::Validation(format!(
            "max_workers must be >= 1, got {}",
            config.max_workers
        )));
    }

    if config.min_crawl_delay_seconds < 1 {
        return Err(ConfigError::Validation(format!(
            "min_crawl_delay_seconds must be >= 1, got {}",
            config.min_crawl_delay_seconds
        )));
    }

    if config.url_max_length == 0 || config.url_max_length > 8192 {
        return Err(ConfigError::Validation(format!(
            "url_max_length must be between 1 and 8192, got {}",
            config.url_max_length
        )));
    }

    if !(0.0..1.0).contains(&config.bloom_fpr) {
        return Err(ConfigError::Validation(format!(
            "bloom_fpr must be between 0 and 1, got {}",
            config.bloom_fpr
        )));
    }

    if config.content_storage != "disabled" && config.content_storage.is_empty() {
        return Err(ConfigError::Validation(
            "content_storage must be \"disabled\" or a directory name".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration.
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
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

/// Validates pod/worker concurrency layout.
fn validate_pod_config(config: &PodConfig) -> Result<(), ConfigError> {
    if config.fetcher_pods < 1 {
        return Err(ConfigError::Validation(
            "fetcher_pods must be >= 1".to_string(),
        ));
    }
    if config.parser_pods < 1 {
        return Err(ConfigError::Validation(
            "parser_pods must be >= 1".to_string(),
        ));
    }
    if config.fetcher_workers_per_pod < 1 {
        return Err(ConfigError::Validation(
            "fetcher_workers_per_pod must be >= 1".to_string(),
        ));
    }
    if config.parser_workers_per_pod < 1 {
        return Err(ConfigError::Validation(
            "parser_workers_per_pod must be >= 1".to_string(),
        ));
    }
    Ok(())
}

/// Validates a domain pattern (supports a `*.` wildcard prefix), used for
/// manual exclusion-file entries.
pub fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "domain pattern cannot be empty".to_string(),
        ));
    }

    if let Some(domain) = pattern.strip_prefix("*.") {
        validate_domain_string(domain)?;
    } else {
        validate_domain_string(pattern)?;
    }

    Ok(())
}

fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::InvalidPattern(format!(
            "domain '{}' must contain at least one dot (e.g., 'example.com')",
            domain
        )));
    }

    Ok(())
}

/// Basic email validation.
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_domain_pattern() {
        assert!(validate_domain_pattern("example.com").is_ok());
        assert!(validate_domain_pattern("*.example.com").is_ok());
        assert!(validate_domain_pattern("sub.example.com").is_ok());

        assert!(validate_domain_pattern("").is_err());
        assert!(validate_domain_pattern("*.").is_err());
        assert!(validate_domain_pattern("example").is_err());
        assert!(validate_domain_pattern(".example.com").is_err());
        assert!(validate_domain_pattern("example.com.").is_err());
    }

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

    fn sample_config() -> Config {
        use crate::config::types::{CrawlerConfig, PodConfig, StoreConfig, UserAgentConfig};
        Config {
            crawler: CrawlerConfig {
                data_dir: "./data".to_string(),
                seed_file: "./seeds.txt".to_string(),
                exclude_file: None,
                resume: false,
                seeded_urls_only: false,
                max_pages: Some(100),
                max_duration: None,
                max_workers: 10,
                min_crawl_delay_seconds: 70,
                url_max_length: 2000,
                non_text_extension_blocklist: vec![".jpg".to_string()],
                candidate_check_limit: None,
                bloom_capacity: None,
                bloom_fpr: 0.001,
                content_storage: "disabled".to_string(),
                fetch_timeout_seconds: 30,
            },
            user_agent: UserAgentConfig {
                crawler_name: "TestCrawler".to_string(),
                crawler_version: "1.0".to_string(),
                contact_url: "https://example.com/about".to_string(),
                contact_email: "admin@example.com".to_string(),
            },
            store: StoreConfig::default(),
            pods: PodConfig::default(),
        }
    }

    #[test]
    fn test_validate_ok() {
        assert!(validate(&sample_config()).is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_data_dir() {
        let mut config = sample_config();
        config.crawler.data_dir = String::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_fpr() {
        let mut config = sample_config();
        config.crawler.bloom_fpr = 1.5;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_pods() {
        let mut config = sample_config();
        config.pods.fetcher_pods = 0;
        assert!(validate(&config).is_err());
    }
}
