use crate::config::types::{BulkConfig, Config, FetcherConfig, ImageConfig, OutputConfig};
use crate::ConfigError;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_fetcher_config(&config.fetcher)?;
    validate_image_config(&config.images)?;
    validate_output_config(&config.output)?;
    validate_bulk_config(&config.bulk)?;
    Ok(())
}

/// Validates fetcher configuration
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "fetcher timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.max_retries < 1 || config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "fetcher max-retries must be between 1 and 10, got {}",
            config.max_retries
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "fetcher user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates image download configuration
fn validate_image_config(config: &ImageConfig) -> Result<(), ConfigError> {
    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "images timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.max_size_mb < 1 {
        return Err(ConfigError::Validation(format!(
            "images max-size-mb must be >= 1, got {}",
            config.max_size_mb
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.output_directory.is_empty() {
        return Err(ConfigError::Validation(
            "output-directory cannot be empty".to_string(),
        ));
    }

    if config.job_history_path.is_empty() {
        return Err(ConfigError::Validation(
            "job-history-path cannot be empty".to_string(),
        ));
    }

    if config.saved_jobs_path.is_empty() {
        return Err(ConfigError::Validation(
            "saved-jobs-path cannot be empty".to_string(),
        ));
    }

    if config.job_history_path == config.saved_jobs_path {
        return Err(ConfigError::Validation(
            "job-history-path and saved-jobs-path must be different files".to_string(),
        ));
    }

    Ok(())
}

/// Validates bulk intake configuration
fn validate_bulk_config(config: &BulkConfig) -> Result<(), ConfigError> {
    if config.max_urls < 1 {
        return Err(ConfigError::Validation(
            "bulk max-urls must be >= 1".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_retry_bounds() {
        let mut config = Config::default();
        config.fetcher.max_retries = 0;
        assert!(validate(&config).is_err());

        config.fetcher.max_retries = 11;
        assert!(validate(&config).is_err());

        config.fetcher.max_retries = 10;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_zero_image_ceiling_rejected() {
        let mut config = Config::default();
        config.images.max_size_mb = 0;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_store_paths_must_differ() {
        let mut config = Config::default();
        config.output.saved_jobs_path = config.output.job_history_path.clone();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_user_agent_rejected() {
        let mut config = Config::default();
        config.fetcher.user_agent = "   ".to_string();
        assert!(validate(&config).is_err());
    }
}
