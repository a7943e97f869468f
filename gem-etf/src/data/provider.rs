//! Price data provider abstraction.
//!
//! A provider only has to deliver the adjusted daily closes of one symbol.
//! Merging the symbols of a `TickerMap` into a `PriceSeries` is shared.

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{PriceSeries, TickerMap};

/// Split- and dividend-adjusted close for one session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyClose {
    pub date: NaiveDate,
    pub close: f64,
}

// ============================================================================
// Provider Error
// ============================================================================

/// Errors specific to data providers.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Network error (connection failed, timeout)
    Network(String),
    /// Rate limit exceeded
    RateLimited { retry_after_secs: Option<u64> },
    /// No rows for the requested symbol or range
    DataNotAvailable(String),
    /// Invalid request parameters (unknown symbol, bad range)
    InvalidRequest(String),
    /// Unexpected response or provider failure
    Internal(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::RateLimited { retry_after_secs } => {
                write!(f, "Rate limited")?;
                if let Some(secs) = retry_after_secs {
                    write!(f, ", retry after {} seconds", secs)?;
                }
                Ok(())
            }
            Self::DataNotAvailable(msg) => write!(f, "Data not available: {}", msg),
            Self::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            Self::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    /// Check if the error is recoverable (worth retrying on a later run)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RateLimited { .. })
    }
}

// ============================================================================
// Price Provider Trait
// ============================================================================

/// Source of daily closing prices.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Provider name for logs (e.g., "yahoo")
    fn name(&self) -> &'static str;

    /// Adjusted daily closes of `symbol` for `start..=end`.
    ///
    /// Rows may come back in any order; an empty vector is allowed.
    async fn fetch_daily_closes(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyClose>, ProviderError>;

    /// Fetch every mapped symbol concurrently and merge by date.
    ///
    /// Fails with `DataNotAvailable` when nothing came back at all.
    async fn fetch(
        &self,
        tickers: &TickerMap,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, ProviderError> {
        if start > end {
            return Err(ProviderError::InvalidRequest(format!(
                "start {} is after end {}",
                start, end
            )));
        }

        let requests = tickers.iter().map(|(key, symbol)| async move {
            let rows = self.fetch_daily_closes(symbol, start, end).await?;
            tracing::debug!(
                provider = self.name(),
                asset = %key,
                symbol = symbol,
                rows = rows.len(),
                "Fetched daily closes"
            );
            Ok::<_, ProviderError>((key, rows))
        });

        let closes = try_join_all(requests).await?;
        let series = PriceSeries::from_closes(closes);

        if series.is_empty() {
            return Err(ProviderError::DataNotAvailable(format!(
                "no prices between {} and {}",
                start, end
            )));
        }

        tracing::info!(
            provider = self.name(),
            sessions = series.len(),
            start = %start,
            end = %end,
            "Price series loaded"
        );
        Ok(series)
    }
}
