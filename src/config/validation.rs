use crate::config::types::{
    BatchConfig, Config, FetchConfig, OutputConfig, QualityConfig, RetryConfig, VendorApiConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_fetch_config(&config.fetch)?;
    validate_retry_config(&config.retry)?;
    validate_batch_config(&config.batch)?;
    validate_vendor_api_config(&config.vendor_api)?;
    validate_quality_config(&config.quality)?;
    validate_output_config(&config.output)?;
    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.request_timeout_secs == 0 || config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request-timeout-secs and connect-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.pre_request_delay_min_ms > config.pre_request_delay_max_ms {
        return Err(ConfigError::Validation(format!(
            "pre-request-delay-min-ms ({}) must not exceed pre-request-delay-max-ms ({})",
            config.pre_request_delay_min_ms, config.pre_request_delay_max_ms
        )));
    }

    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 || config.max_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be between 1 and 10, got {}",
            config.max_attempts
        )));
    }

    if config.base_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "base-delay-ms ({}) must not exceed max-delay-ms ({})",
            config.base_delay_ms, config.max_delay_ms
        )));
    }

    Ok(())
}

fn validate_batch_config(config: &BatchConfig) -> Result<(), ConfigError> {
    if config.max_workers < 1 || config.max_workers > 64 {
        return Err(ConfigError::Validation(format!(
            "max-workers must be between 1 and 64, got {}",
            config.max_workers
        )));
    }

    if config.batch_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "batch-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_vendor_api_config(config: &VendorApiConfig) -> Result<(), ConfigError> {
    validate_base_url("github-base-url", &config.github_base_url)?;
    validate_base_url("msrc-base-url", &config.msrc_base_url)?;
    Ok(())
}

fn validate_base_url(name: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}: {}", name, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            name, value
        )));
    }

    Ok(())
}

fn validate_quality_config(config: &QualityConfig) -> Result<(), ConfigError> {
    if config.acceptable_threshold > 100 || config.high_confidence_threshold > 100 {
        return Err(ConfigError::Validation(
            "quality thresholds must be between 0 and 100".to_string(),
        ));
    }

    if config.acceptable_threshold > config.high_confidence_threshold {
        return Err(ConfigError::Validation(format!(
            "acceptable-threshold ({}) must not exceed high-confidence-threshold ({})",
            config.acceptable_threshold, config.high_confidence_threshold
        )));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.summary_path.is_empty() {
        return Err(ConfigError::Validation(
            "summary-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
