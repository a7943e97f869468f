//! Configuration management for the GEM ETF decision service.
//!
//! The service reads a single configuration file, `~/.gem-etf/config.json` by
//! default. Files ending in `.yaml` or `.yml` are parsed as YAML, anything else
//! as JSON.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (see below)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `EMAIL_FROM` → email.from
//! - `EMAIL_TO` → email.to
//! - `RESEND_API_KEY` → email.api_key
//! - `GEM_LOOKBACK_MONTHS` → strategy.lookback_months
//! - `GEM_LOG_LEVEL` → observability.log_level
//! - `GEM_LOG_FORMAT` → observability.log_format
//!
//! # Example
//!
//! ```json
//! {
//!   "tickers": { "US": "SPY", "EXUS": "VEU", "BONDS": "AGG", "CASH_PROXY": "BIL" },
//!   "strategy": { "lookback_months": 12 },
//!   "email": { "from": "gem@example.com", "to": "me@example.com" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Asset roles the decision rule is written against, in report order.
pub const REQUIRED_ASSET_KEYS: [&str; 4] = ["US", "EXUS", "BONDS", "CASH_PROXY"];

/// Upper bound for `strategy.lookback_months` and `data.fetch_buffer_months`.
pub const MAX_LOOKBACK_MONTHS: u32 = 1200;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".gem-etf"),
        |dirs| dirs.home_dir().join(".gem-etf"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Asset role → market symbol (`US`, `EXUS`, `BONDS`, `CASH_PROXY`)
    #[serde(default = "default_tickers")]
    pub tickers: BTreeMap<String, String>,

    /// Momentum rule parameters
    #[serde(default)]
    pub strategy: StrategyConfig,

    /// Market data provider settings
    #[serde(default)]
    pub data: DataConfig,

    /// Email notification settings
    #[serde(default)]
    pub email: EmailConfig,

    /// Report archive and decision history locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// Monthly cron schedule
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tickers: default_tickers(),
            strategy: StrategyConfig::default(),
            data: DataConfig::default(),
            email: EmailConfig::default(),
            storage: StorageConfig::default(),
            schedule: ScheduleConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    ///
    /// The parser is chosen by extension: `.yaml`/`.yml` use YAML, anything
    /// else JSON.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;

        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

        if is_yaml {
            serde_yaml::from_str(&content).map_err(|source| Error::Yaml {
                path: path.to_path_buf(),
                source,
            })
        } else {
            serde_json::from_str(&content).map_err(|source| Error::Json {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    /// Load from `path` (or the default location) and apply environment overrides.
    pub fn load_with_env(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (environment in production).
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(from) = lookup("EMAIL_FROM") {
            self.email.from = from;
        }
        if let Some(to) = lookup("EMAIL_TO") {
            self.email.to = to;
        }
        if let Some(key) = lookup("RESEND_API_KEY").filter(|k| !k.is_empty()) {
            self.email.api_key = Some(key);
        }

        if let Some(months) = lookup("GEM_LOOKBACK_MONTHS") {
            match months.parse() {
                Ok(m) => self.strategy.lookback_months = m,
                Err(_) => tracing::warn!(value = %months, "Ignoring invalid GEM_LOOKBACK_MONTHS"),
            }
        }

        if let Some(level) = lookup("GEM_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("GEM_LOG_FORMAT") {
            self.observability.log_format = format;
        }
    }

    /// Directory that receives one Markdown report per analysed month.
    pub fn reports_dir(&self) -> PathBuf {
        self.storage
            .reports_dir
            .clone()
            .unwrap_or_else(|| config_dir().join("reports"))
    }

    /// Append-only CSV decision log.
    pub fn history_path(&self) -> PathBuf {
        self.storage
            .history_path
            .clone()
            .unwrap_or_else(|| config_dir().join("decisions.csv"))
    }

    /// Copy of the configuration that is safe to print.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.email.api_key.is_some() {
            copy.email.api_key = Some("***".into());
        }
        copy
    }
}

fn default_tickers() -> BTreeMap<String, String> {
    [("US", "SPY"), ("EXUS", "VEU"), ("BONDS", "AGG"), ("CASH_PROXY", "BIL")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// ============================================================================
// Strategy Configuration
// ============================================================================

/// Momentum rule parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Look-back window in calendar months
    #[serde(default = "default_lookback_months")]
    pub lookback_months: u32,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            lookback_months: default_lookback_months(),
        }
    }
}

fn default_lookback_months() -> u32 {
    12
}

// ============================================================================
// Data Configuration
// ============================================================================

/// Market data provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Base URL of the Yahoo Finance chart API
    #[serde(default = "default_provider_url")]
    pub provider_url: String,

    /// HTTP timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra months fetched before the comparison date
    #[serde(default = "default_fetch_buffer_months")]
    pub fetch_buffer_months: u32,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            provider_url: default_provider_url(),
            timeout_secs: default_timeout_secs(),
            fetch_buffer_months: default_fetch_buffer_months(),
        }
    }
}

fn default_provider_url() -> String {
    "https://query1.finance.yahoo.com".into()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_fetch_buffer_months() -> u32 {
    1
}

// ============================================================================
// Email Configuration
// ============================================================================

/// Email notification settings (Resend API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Send the monthly report by email
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Sender address
    #[serde(default)]
    pub from: String,

    /// Recipient address
    #[serde(default)]
    pub to: String,

    /// Subject prefix, followed by ` - YYYY-MM (MODE)`
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,

    /// Resend API key. Usually supplied through `RESEND_API_KEY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Resend API base URL
    #[serde(default = "default_email_api_url")]
    pub api_url: String,

    /// Delivery attempts before giving up
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// HTTP timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            from: String::new(),
            to: String::new(),
            subject_prefix: default_subject_prefix(),
            api_key: None,
            api_url: default_email_api_url(),
            retry_count: default_retry_count(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_subject_prefix() -> String {
    "GEM ETF Decision".into()
}

fn default_email_api_url() -> String {
    "https://api.resend.com".into()
}

fn default_retry_count() -> u32 {
    3
}

// ============================================================================
// Storage Configuration
// ============================================================================

/// Output locations. Unset paths fall back to the config directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for `YYYY-MM.md` reports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reports_dir: Option<PathBuf>,

    /// CSV decision history file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_path: Option<PathBuf>,
}

// ============================================================================
// Schedule Configuration
// ============================================================================

/// Cron schedule for the long-running `schedule` mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Enable the scheduler
    #[serde(default)]
    pub enabled: bool,

    /// Six-field cron expression evaluated in UTC (sec min hour day month dow)
    #[serde(default = "default_schedule_cron")]
    pub cron: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cron: default_schedule_cron(),
        }
    }
}

fn default_schedule_cron() -> String {
    // 07:00 UTC on the first day of every month
    "0 0 7 1 * *".into()
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Optional log file, written in addition to stdout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            log_file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

fn default_true() -> bool {
    true
}
