use super::{types::Config, ConfigError};

/// Reject configurations the matchmaker cannot run with.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mm = &config.matchmaker;

    if mm.interval_sec == 0 {
        return Err(ConfigError::ValidationError(
            "matchmaker.interval_sec must be positive".to_string(),
        ));
    }
    if mm.max_intervals == 0 {
        return Err(ConfigError::ValidationError(
            "matchmaker.max_intervals must be positive".to_string(),
        ));
    }
    if mm.max_tickets == 0 {
        return Err(ConfigError::ValidationError(
            "matchmaker.max_tickets must be positive".to_string(),
        ));
    }
    if mm.max_candidates == 0 {
        return Err(ConfigError::ValidationError(
            "matchmaker.max_candidates must be positive".to_string(),
        ));
    }
    if mm.token_secret.is_empty() {
        return Err(ConfigError::ValidationError(
            "matchmaker.token_secret must not be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = load_config_from_str("[matchmaker]\ninterval_sec = 0").unwrap();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_zero_max_tickets_rejected() {
        let config = load_config_from_str("[matchmaker]\nmax_tickets = 0").unwrap();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_empty_token_secret_rejected() {
        let config = load_config_from_str("[matchmaker]\ntoken_secret = \"\"").unwrap();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
