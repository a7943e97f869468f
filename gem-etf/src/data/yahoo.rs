//! Yahoo Finance chart API adapter.
//!
//! Uses the public v8 chart endpoint:
//! `GET {base}/v8/finance/chart/{symbol}?period1&period2&interval=1d`
//!
//! # Adjusted closes
//!
//! Prices come from `indicators.adjclose` (split and dividend adjusted) and
//! fall back to `indicators.quote[0].close` when the adjusted series is
//! absent. Sessions with a null price are skipped.
//!
//! # Dates
//!
//! Timestamps mark the session open in UTC. They are shifted by
//! `meta.gmtoffset` so every row lands on its exchange-local trading date.
//! `period2` is exclusive, so the request runs to `end + 1 day`.

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::provider::{DailyClose, PriceProvider, ProviderError};

/// Default public endpoint
pub const YAHOO_API_BASE: &str = "https://query1.finance.yahoo.com";

/// Yahoo rejects requests without a browser-like agent
const USER_AGENT: &str = "Mozilla/5.0 (compatible; gem-etf/0.1)";

/// Seconds to wait after a 429
const RATE_LIMIT_RETRY_SECS: u64 = 60;

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    #[serde(default)]
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Default, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
    #[serde(default)]
    adjclose: Vec<AdjCloseSeries>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Default, Deserialize)]
struct AdjCloseSeries {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

// ============================================================================
// Yahoo Chart Provider
// ============================================================================

/// Daily closes from the Yahoo Finance chart API.
pub struct YahooChartProvider {
    client: reqwest::Client,
    base_url: String,
}

impl YahooChartProvider {
    /// Create a provider against the public endpoint
    pub fn new() -> Self {
        Self::with_base_url(YAHOO_API_BASE, Duration::from_secs(30))
    }

    /// Create a provider against a custom endpoint (mirror or mock server)
    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create from config
    pub fn from_config(config: &gem_common::DataConfig) -> Self {
        Self::with_base_url(&config.provider_url, Duration::from_secs(config.timeout_secs))
    }

    fn parse_chart(symbol: &str, result: &ChartResult) -> Vec<DailyClose> {
        let prices = result
            .indicators
            .adjclose
            .first()
            .map(|a| &a.adjclose)
            .filter(|a| !a.is_empty())
            .or_else(|| result.indicators.quote.first().map(|q| &q.close));

        let Some(prices) = prices else {
            debug!(symbol = symbol, "Chart response carries no price series");
            return Vec::new();
        };

        let offset = result.meta.gmtoffset;
        result
            .timestamp
            .iter()
            .zip(prices.iter())
            .filter_map(|(ts, price)| {
                let close = (*price)?;
                let date = DateTime::from_timestamp(ts + offset, 0)?.date_naive();
                Some(DailyClose { date, close })
            })
            .collect()
    }
}

impl Default for YahooChartProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn unix_midnight(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

#[async_trait]
impl PriceProvider for YahooChartProvider {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch_daily_closes(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyClose>, ProviderError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        let period1 = unix_midnight(start);
        let period2 = unix_midnight(end + Days::new(1));

        debug!(url = %url, symbol = symbol, period1, period2, "Fetching chart from Yahoo");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", "1d".to_string()),
                ("events", "div,splits".to_string()),
                ("includeAdjustedClose", "true".to_string()),
            ])
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Network("Request timeout".into())
                } else if e.is_connect() {
                    ProviderError::Network("Connection failed".into())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited {
                retry_after_secs: Some(RATE_LIMIT_RETRY_SECS),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(format!("Failed to read response: {}", e)))?;

        // Unknown symbols come back as 404 with a chart.error body.
        let parsed: Result<ChartResponse, _> = serde_json::from_str(&body);
        if let Ok(ChartResponse {
            chart: ChartBody {
                error: Some(err), ..
            },
        }) = &parsed
        {
            return Err(ProviderError::DataNotAvailable(format!(
                "{}: {} ({})",
                symbol, err.description, err.code
            )));
        }

        if !status.is_success() {
            return Err(ProviderError::Internal(format!("HTTP {}: {}", status, body)));
        }

        let chart = parsed
            .map_err(|e| ProviderError::Internal(format!("Failed to parse response: {}", e)))?
            .chart;

        let rows: Vec<DailyClose> = chart
            .result
            .unwrap_or_default()
            .iter()
            .flat_map(|result| Self::parse_chart(symbol, result))
            .filter(|row| row.date >= start && row.date <= end)
            .collect();

        debug!(symbol = symbol, rows = rows.len(), "Parsed Yahoo chart");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Vec<DailyClose> {
        let response: ChartResponse = serde_json::from_str(json).unwrap();
        let results = response.chart.result.unwrap();
        YahooChartProvider::parse_chart("SPY", &results[0])
    }

    #[test]
    fn test_parse_prefers_adjclose_and_skips_nulls() {
        // 2024-01-02 and 2024-01-03, 14:30 UTC
        let rows = parse(
            r#"{"chart":{"result":[{
                "meta":{"symbol":"SPY","gmtoffset":-18000},
                "timestamp":[1704205800,1704292200,1704378600],
                "indicators":{
                    "quote":[{"close":[472.65,468.79,467.28]}],
                    "adjclose":[{"adjclose":[465.10,null,459.98]}]
                }}],"error":null}}"#,
        );

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(rows[0].close, 465.10);
        assert_eq!(rows[1].date, NaiveDate::from_ymd_opt(2024, 1, 4).unwrap());
    }

    #[test]
    fn test_parse_falls_back_to_close() {
        let rows = parse(
            r#"{"chart":{"result":[{
                "meta":{"gmtoffset":0},
                "timestamp":[1704205800],
                "indicators":{"quote":[{"close":[472.65]}]}
                }],"error":null}}"#,
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].close, 472.65);
    }

    #[test]
    fn test_gmtoffset_shifts_to_exchange_date() {
        // 2024-01-03 02:00 UTC is still 2024-01-02 in New York
        let rows = parse(
            r#"{"chart":{"result":[{
                "meta":{"gmtoffset":-18000},
                "timestamp":[1704247200],
                "indicators":{"quote":[{"close":[1.0]}]}
                }],"error":null}}"#,
        );
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[test]
    fn test_unix_midnight() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(unix_midnight(date), 1_704_153_600);
    }
}
