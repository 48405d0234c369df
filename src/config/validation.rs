//! Configuration validation logic

use super::Config;
use crate::constants::MAX_CLIENTS_LIMIT;
use crate::errors::{Result, StampedeError};
use url::Url;

/// Validate the configuration before any client is created
pub fn validate(config: &Config) -> Result<()> {
    validate_endpoint(config)?;
    validate_channel(config)?;
    validate_load(config)?;
    validate_behavior(config)?;
    Ok(())
}

/// Validate endpoint credentials
fn validate_endpoint(config: &Config) -> Result<()> {
    if config.endpoint.url.is_empty() {
        return Err(StampedeError::config(
            "Endpoint URL is required (set --endpoint or STAMPEDE_ENDPOINT_URL)",
        ));
    }

    if config.uses_local_backend() {
        // The loopback backend needs no credentials
        return Ok(());
    }

    let url = Url::parse(&config.endpoint.url).map_err(|e| {
        StampedeError::config(format!(
            "Invalid endpoint URL '{}': {}",
            config.endpoint.url, e
        ))
    })?;

    match url.scheme() {
        "ws" | "wss" | "http" | "https" => {}
        scheme => {
            return Err(StampedeError::config(format!(
                "Invalid endpoint scheme '{}'. Use ws, wss, http, https, or memory for a local dry run",
                scheme
            )));
        }
    }

    if config.endpoint.api_key.is_empty() {
        return Err(StampedeError::config(
            "API key is required (set --api-key or STAMPEDE_API_KEY)",
        ));
    }

    Ok(())
}

/// Validate the target channel
fn validate_channel(config: &Config) -> Result<()> {
    if config.channel_id.is_empty() {
        return Err(StampedeError::config(
            "Event channel id is required (set --event or STAMPEDE_EVENT_ID)",
        ));
    }
    Ok(())
}

/// Validate population and timing
fn validate_load(config: &Config) -> Result<()> {
    if config.load.user_count == 0 {
        return Err(StampedeError::config("Number of users must be greater than 0"));
    }

    if config.load.user_count > MAX_CLIENTS_LIMIT {
        return Err(StampedeError::config(format!(
            "Number of users cannot exceed {}",
            MAX_CLIENTS_LIMIT
        )));
    }

    if config.load.duration_secs <= config.load.ramp_up_secs {
        return Err(StampedeError::config(format!(
            "Duration ({}s) must be greater than the ramp-up time ({}s)",
            config.load.duration_secs, config.load.ramp_up_secs
        )));
    }

    if config.load.activity_interval_secs == 0 {
        return Err(StampedeError::config(
            "Activity interval must be greater than 0",
        ));
    }

    Ok(())
}

/// Validate behavior knobs
fn validate_behavior(config: &Config) -> Result<()> {
    let p = config.behavior.broadcast_probability;
    if !(0.0..=1.0).contains(&p) {
        return Err(StampedeError::config(format!(
            "Broadcast probability must be between 0.0 and 1.0 (got {})",
            p
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample_config;

    #[test]
    fn test_validate_valid_config() {
        let config = sample_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_validate_missing_endpoint() {
        let mut config = sample_config();
        config.endpoint.url = String::new();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("Endpoint URL"));
    }

    #[test]
    fn test_validate_invalid_scheme() {
        let mut config = sample_config();
        config.endpoint.url = "ftp://example.com".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_missing_api_key() {
        let mut config = sample_config();
        config.endpoint.api_key = String::new();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("API key"));
    }

    #[test]
    fn test_validate_memory_backend_needs_no_key() {
        let mut config = sample_config();
        config.endpoint.url = "memory://".to_string();
        config.endpoint.api_key = String::new();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_validate_missing_channel_id() {
        let mut config = sample_config();
        config.channel_id = String::new();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("channel id"));
    }

    #[test]
    fn test_validate_zero_users() {
        let mut config = sample_config();
        config.load.user_count = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_too_many_users() {
        let mut config = sample_config();
        config.load.user_count = MAX_CLIENTS_LIMIT + 1;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_duration_not_beyond_ramp_up() {
        let mut config = sample_config();
        config.load.duration_secs = 5;
        config.load.ramp_up_secs = 5;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_zero_interval() {
        let mut config = sample_config();
        config.load.activity_interval_secs = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_probability_out_of_range() {
        let mut config = sample_config();
        config.behavior.broadcast_probability = 1.5;
        assert!(validate(&config).is_err());
    }
}
