use crate::config::types::{Config, CrawlerConfig, FetchConfig, OutputConfig};
use crate::url::{validate_category, SiteUrls};
use crate::ConfigError;
use std::collections::HashSet;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_fetch_config(&config.fetch)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawl scope and pacing configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    SiteUrls::new(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if config.target < 1 {
        return Err(ConfigError::Validation(
            "target must be >= 1".to_string(),
        ));
    }

    validate_categories(&config.categories)?;

    if !config.delay_scale.is_finite() || config.delay_scale < 0.0 {
        return Err(ConfigError::Validation(format!(
            "delay-scale must be a finite number >= 0, got {}",
            config.delay_scale
        )));
    }

    if config.rotate_session_every < 1 {
        return Err(ConfigError::Validation(
            "rotate-session-every must be >= 1".to_string(),
        ));
    }

    if config.max_requests_per_category < 1 {
        return Err(ConfigError::Validation(
            "max-requests-per-category must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Categories must be non-empty, unique and path-safe
fn validate_categories(categories: &[String]) -> Result<(), ConfigError> {
    if categories.is_empty() {
        return Err(ConfigError::Validation(
            "categories cannot be empty".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for category in categories {
        validate_category(category)
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        if !seen.insert(category.as_str()) {
            return Err(ConfigError::Validation(format!(
                "category '{}' is listed more than once",
                category
            )));
        }
    }

    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.max_attempts < 1 || config.max_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be between 1 and 10, got {}",
            config.max_attempts
        )));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.path.is_empty() {
        return Err(ConfigError::Validation(
            "output path cannot be empty".to_string(),
        ));
    }

    if config.batch_size < 1 {
        return Err(ConfigError::Validation(
            "batch-size must be >= 1".to_string(),
        ));
    }

    if config.license.trim().is_empty() {
        return Err(ConfigError::Validation(
            "license cannot be empty".to_string(),
        ));
    }

    Ok(())
}
