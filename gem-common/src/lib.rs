//! GEM Common - configuration, validation, errors and logging for the GEM ETF
//! decision service.
//!
//! This crate provides:
//! - Configuration types and loading (JSON or YAML)
//! - Configuration validation
//! - Shared error type
//! - Logging setup

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod validation;

pub use config::{
    Config, DataConfig, EmailConfig, ObservabilityConfig, ScheduleConfig, StorageConfig,
    StrategyConfig, MAX_LOOKBACK_MONTHS, REQUIRED_ASSET_KEYS,
};
pub use error::{Error, Result};
pub use validation::{Validate, ValidationError, ValidationResult};

