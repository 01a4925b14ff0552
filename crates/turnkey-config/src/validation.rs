// SPDX-FileCopyrightText: 2026 Turnkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as non-empty paths and attempt/quota lower bounds.

use crate::diagnostic::ConfigError;
use crate::model::TurnkeyConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &TurnkeyConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.crm.log_level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "crm.log_level must be one of {}, got `{}`",
                LOG_LEVELS.join(", "),
                config.crm.log_level
            ),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.otp.ttl_minutes < 1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "otp.ttl_minutes must be at least 1, got {}",
                config.otp.ttl_minutes
            ),
        });
    }

    if config.otp.max_attempts < 1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "otp.max_attempts must be at least 1, got {}",
                config.otp.max_attempts
            ),
        });
    }

    if let Some(secret) = &config.otp.secret
        && secret.trim().is_empty()
    {
        errors.push(ConfigError::Validation {
            message: "otp.secret must not be empty when set".to_string(),
        });
    }

    // A gateway without credentials would fail every send; require the pair.
    if config.sms.gateway_url.is_some() && config.sms.api_key.is_none() {
        errors.push(ConfigError::Validation {
            message: "sms.api_key is required when sms.gateway_url is set".to_string(),
        });
    }

    if !config.sms.fallback_base_url.starts_with("http://")
        && !config.sms.fallback_base_url.starts_with("https://")
    {
        errors.push(ConfigError::Validation {
            message: format!(
                "sms.fallback_base_url must be an http(s) URL, got `{}`",
                config.sms.fallback_base_url
            ),
        });
    }

    if config.sms.timeout_secs < 1 {
        errors.push(ConfigError::Validation {
            message: "sms.timeout_secs must be at least 1".to_string(),
        });
    }

    if config.assignment.daily_quota < 1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "assignment.daily_quota must be at least 1, got {}",
                config.assignment.daily_quota
            ),
        });
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TurnkeyConfig;

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&TurnkeyConfig::default()).is_ok());
    }

    #[test]
    fn collects_all_errors_instead_of_failing_fast() {
        let mut config = TurnkeyConfig::default();
        config.crm.log_level = "loud".into();
        config.otp.max_attempts = 0;
        config.assignment.daily_quota = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn gateway_requires_api_key() {
        let mut config = TurnkeyConfig::default();
        config.sms.gateway_url = Some("https://sms.example/send".into());
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("sms.api_key"));

        config.sms.api_key = Some("key".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn fallback_url_must_be_http() {
        let mut config = TurnkeyConfig::default();
        config.sms.fallback_base_url = "ftp://nope".into();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn empty_secret_is_rejected() {
        let mut config = TurnkeyConfig::default();
        config.otp.secret = Some("  ".into());
        assert!(validate_config(&config).is_err());
        config.otp.secret = Some("a-real-secret".into());
        assert!(validate_config(&config).is_ok());
    }
}
