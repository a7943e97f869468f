//! Configuration validation.
//!
//! Checks that the ticker map covers exactly the four asset roles and that
//! every section holds usable values before the pipeline runs.

use std::str::FromStr;
use thiserror::Error;

use crate::config::{
    Config, DataConfig, EmailConfig, ObservabilityConfig, ScheduleConfig, StrategyConfig,
    MAX_LOOKBACK_MONTHS, REQUIRED_ASSET_KEYS,
};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.validate_tickers() {
            errors.push(e);
        }

        let sections: [&dyn Validate; 5] = [
            &self.strategy,
            &self.data,
            &self.email,
            &self.schedule,
            &self.observability,
        ];
        for section in sections {
            if let Err(e) = section.validate() {
                errors.push(e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }

    /// The ticker map must name exactly the four asset roles.
    fn validate_tickers(&self) -> ValidationResult<()> {
        for key in REQUIRED_ASSET_KEYS {
            match self.tickers.get(key) {
                None => {
                    return Err(ValidationError::MissingField {
                        field: format!("tickers.{}", key),
                    })
                }
                Some(symbol) if symbol.trim().is_empty() => {
                    return Err(ValidationError::InvalidValue {
                        field: format!("tickers.{}", key),
                        reason: "symbol must not be empty".into(),
                    })
                }
                Some(_) => {}
            }
        }

        if let Some(unknown) = self
            .tickers
            .keys()
            .find(|k| !REQUIRED_ASSET_KEYS.contains(&k.as_str()))
        {
            return Err(ValidationError::InvalidValue {
                field: format!("tickers.{}", unknown),
                reason: format!(
                    "unknown asset key, expected one of: {}",
                    REQUIRED_ASSET_KEYS.join(", ")
                ),
            });
        }

        Ok(())
    }
}

impl Validate for StrategyConfig {
    fn validate(&self) -> ValidationResult<()> {
        if !(1..=MAX_LOOKBACK_MONTHS).contains(&self.lookback_months) {
            return Err(ValidationError::InvalidValue {
                field: "strategy.lookback_months".into(),
                reason: format!("must be between 1 and {}", MAX_LOOKBACK_MONTHS),
            });
        }

        Ok(())
    }
}

impl Validate for DataConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.provider_url.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "data.provider_url".into(),
            });
        }
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "data.timeout_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.fetch_buffer_months > MAX_LOOKBACK_MONTHS {
            return Err(ValidationError::InvalidValue {
                field: "data.fetch_buffer_months".into(),
                reason: format!("must be at most {}", MAX_LOOKBACK_MONTHS),
            });
        }

        Ok(())
    }
}

impl Validate for EmailConfig {
    fn validate(&self) -> ValidationResult<()> {
        // Without an API key the send is skipped, so addresses are optional.
        let has_key = self.api_key.as_deref().is_some_and(|k| !k.is_empty());
        if !self.enabled || !has_key {
            return Ok(());
        }

        for (field, value) in [("email.from", &self.from), ("email.to", &self.to)] {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField {
                    field: field.into(),
                });
            }
            if !value.contains('@') {
                return Err(ValidationError::InvalidValue {
                    field: field.into(),
                    reason: format!("not an email address: {}", value),
                });
            }
        }

        if self.retry_count == 0 {
            return Err(ValidationError::InvalidValue {
                field: "email.retry_count".into(),
                reason: "must be at least 1".into(),
            });
        }

        Ok(())
    }
}

impl Validate for ScheduleConfig {
    fn validate(&self) -> ValidationResult<()> {
        if cron::Schedule::from_str(&self.cron).is_err() {
            return Err(ValidationError::InvalidValue {
                field: "schedule.cron".into(),
                reason: format!("invalid cron expression: {}", self.cron),
            });
        }

        Ok(())
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            });
        }

        Ok(())
    }
}
