//! Configuration types.

use crate::error::ConfigError;

/// Tunable settings consumed by the flow builders and rule evaluation.
#[derive(Debug, Clone)]
pub struct WizardConfig {
    /// Minimum password length for account creation.
    pub min_password_len: usize,
    /// Minimum bio length on the professional profile.
    pub min_bio_len: usize,
    /// Message used when a rule cannot be evaluated (fails closed).
    pub rule_fallback_message: String,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            min_password_len: 8,
            min_bio_len: 50,
            rule_fallback_message: "This field could not be validated".to_string(),
        }
    }
}

impl WizardConfig {
    /// Build from environment variables, falling back to defaults for unset keys.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let min_password_len =
            read_len("NUTRI_WIZARD_MIN_PASSWORD_LEN")?.unwrap_or(defaults.min_password_len);
        let min_bio_len = read_len("NUTRI_WIZARD_MIN_BIO_LEN")?.unwrap_or(defaults.min_bio_len);
        let rule_fallback_message = std::env::var("NUTRI_WIZARD_RULE_FALLBACK_MESSAGE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.rule_fallback_message);

        Ok(Self {
            min_password_len,
            min_bio_len,
            rule_fallback_message,
        })
    }
}

fn read_len(key: &str) -> Result<Option<usize>, ConfigError> {
    let Ok(raw) = std::env::var(key) else {
        return Ok(None);
    };
    parse_len(key, &raw).map(Some)
}

fn parse_len(key: &str, raw: &str) -> Result<usize, ConfigError> {
    let value: usize = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("expected a positive integer, got {raw:?}"),
    })?;
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}
