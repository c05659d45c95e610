use crate::config::types::{
    Config, CrawlerConfig, ExtractorConfig, OutputConfig, PipelineConfig, UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Upper bound on either worker pool
const MAX_CONCURRENCY: u32 = 256;

/// Upper bound on per-fetch retries
const MAX_RETRIES: u32 = 10;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_extractor_config(&config.extractor)?;
    validate_pipeline_config(&config.pipeline, &config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.crawl_concurrency < 1 || config.crawl_concurrency > MAX_CONCURRENCY {
        return Err(ConfigError::Validation(format!(
            "crawl-concurrency must be between 1 and {}, got {}",
            MAX_CONCURRENCY, config.crawl_concurrency
        )));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.per_page_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "crawler per-page-timeout-ms must be > 0".to_string(),
        ));
    }

    if config.max_retries > MAX_RETRIES {
        return Err(ConfigError::Validation(format!(
            "max-retries must be <= {}, got {}",
            MAX_RETRIES, config.max_retries
        )));
    }

    if config.max_backoff_ms < config.retry_backoff_ms {
        return Err(ConfigError::Validation(format!(
            "max-backoff-ms ({}) must be >= retry-backoff-ms ({})",
            config.max_backoff_ms, config.retry_backoff_ms
        )));
    }

    if let Some(prefix) = &config.path_prefix {
        if !prefix.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "path-prefix must start with '/', got '{}'",
                prefix
            )));
        }
    }

    Ok(())
}

/// Validates classification/extraction configuration
fn validate_extractor_config(config: &ExtractorConfig) -> Result<(), ConfigError> {
    if config.extract_concurrency < 1 || config.extract_concurrency > MAX_CONCURRENCY {
        return Err(ConfigError::Validation(format!(
            "extract-concurrency must be between 1 and {}, got {}",
            MAX_CONCURRENCY, config.extract_concurrency
        )));
    }

    if config.per_page_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "extractor per-page-timeout-ms must be > 0".to_string(),
        ));
    }

    let floor = config.classifier_confidence_floor;
    if !floor.is_finite() || !(0.0..=1.0).contains(&floor) {
        return Err(ConfigError::Validation(format!(
            "classifier-confidence-floor must be within [0, 1], got {}",
            floor
        )));
    }

    Ok(())
}

/// Validates the overall deadline against the per-page deadlines it must contain
fn validate_pipeline_config(
    config: &PipelineConfig,
    crawler: &CrawlerConfig,
) -> Result<(), ConfigError> {
    if config.overall_timeout_ms <= crawler.per_page_timeout_ms {
        return Err(ConfigError::Validation(format!(
            "overall-timeout-ms ({}) must be greater than the crawler per-page-timeout-ms ({})",
            config.overall_timeout_ms, crawler.per_page_timeout_ms
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // The name doubles as the robots.txt product token
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters, hyphens and underscores, got '{}'",
            config.crawler_name
        )));
    }

    if config.crawler_version.trim().is_empty() {
        return Err(ConfigError::Validation(
            "crawler-version cannot be empty".to_string(),
        ));
    }

    if let Some(contact_url) = &config.contact_url {
        Url::parse(contact_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("contact-url: {}", e)))?;
    }

    if let Some(email) = &config.contact_email {
        validate_email(email)?;
    }

    Ok(())
}

/// Basic shape check for a contact email address
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.contains('@'),
        None => false,
    };

    if !valid {
        return Err(ConfigError::Validation(format!(
            "contact-email must be a valid email address, got '{}'",
            email
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if let Some(spec_path) = &config.spec_path {
        let lower = spec_path.to_lowercase();
        if !(lower.ends_with(".json") || lower.ends_with(".yaml") || lower.ends_with(".yml")) {
            return Err(ConfigError::Validation(format!(
                "spec-path must end in .json, .yaml or .yml, got '{}'",
                spec_path
            )));
        }
    }

    for (key, value) in [
        ("store-path", &config.store_path),
        ("summary-path", &config.summary_path),
    ] {
        if matches!(value, Some(path) if path.trim().is_empty()) {
            return Err(ConfigError::Validation(format!("{} cannot be empty", key)));
        }
    }

    Ok(())
}
