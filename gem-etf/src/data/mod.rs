//! Market data types and the as-of price snapshot resolver.
//!
//! Provides:
//! - `AssetKey`: the four asset roles the momentum rule works with
//! - `TickerMap`: role → market symbol
//! - `PriceSeries` / `PriceSnapshot`: daily closes and a single as-of row
//! - `resolve`: latest available row on or before a target date
//! - `PriceProvider`: the async data source abstraction

pub mod provider;
pub mod yahoo;

pub use provider::{DailyClose, PriceProvider, ProviderError};
pub use yahoo::YahooChartProvider;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::{GemError, SnapshotRole};

// ============================================================================
// Asset Keys
// ============================================================================

/// Portfolio role of an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AssetKey {
    /// US equities
    #[serde(rename = "US")]
    Us,
    /// Equities outside the US
    #[serde(rename = "EXUS")]
    ExUs,
    /// Aggregate bonds, the defensive asset
    #[serde(rename = "BONDS")]
    Bonds,
    /// Treasury bills, the risk-free benchmark
    #[serde(rename = "CASH_PROXY")]
    CashProxy,
}

impl AssetKey {
    /// All keys in report order.
    pub const ALL: [AssetKey; 4] = [Self::Us, Self::ExUs, Self::Bonds, Self::CashProxy];

    /// Configuration spelling of the key.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Us => "US",
            Self::ExUs => "EXUS",
            Self::Bonds => "BONDS",
            Self::CashProxy => "CASH_PROXY",
        }
    }

    /// Human readable asset class.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Us => "US Equities",
            Self::ExUs => "ex-US Equities",
            Self::Bonds => "Bonds",
            Self::CashProxy => "Cash (T-Bills)",
        }
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised asset key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown asset key '{0}' (expected US, EXUS, BONDS or CASH_PROXY)")]
pub struct ParseAssetKeyError(pub String);

impl FromStr for AssetKey {
    type Err = ParseAssetKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "US" => Ok(Self::Us),
            "EXUS" => Ok(Self::ExUs),
            "BONDS" => Ok(Self::Bonds),
            "CASH_PROXY" => Ok(Self::CashProxy),
            other => Err(ParseAssetKeyError(other.to_string())),
        }
    }
}

// ============================================================================
// Ticker Map
// ============================================================================

/// Asset role → market symbol, fixed for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TickerMap(BTreeMap<AssetKey, String>);

impl TickerMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the string-keyed configuration table.
    pub fn from_config(tickers: &BTreeMap<String, String>) -> Result<Self, ParseAssetKeyError> {
        tickers
            .iter()
            .map(|(key, symbol)| key.parse::<AssetKey>().map(|k| (k, symbol.clone())))
            .collect()
    }

    pub fn insert(&mut self, key: AssetKey, symbol: impl Into<String>) -> Option<String> {
        self.0.insert(key, symbol.into())
    }

    pub fn get(&self, key: AssetKey) -> Option<&str> {
        self.0.get(&key).map(String::as_str)
    }

    pub fn contains(&self, key: AssetKey) -> bool {
        self.0.contains_key(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (AssetKey, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(AssetKey, S)> for TickerMap {
    fn from_iter<I: IntoIterator<Item = (AssetKey, S)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, s)| (k, s.into())).collect())
    }
}

// ============================================================================
// Price Series
// ============================================================================

/// Closing prices of all assets on one trading day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub prices: BTreeMap<AssetKey, f64>,
}

/// Daily closes, normally ascending by date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Wrap points as given. Ordering is not checked here; `resolve` copes
    /// with unsorted input.
    pub fn new(points: Vec<PricePoint>) -> Self {
        Self { points }
    }

    /// Merge per-asset close histories into one series keyed by date.
    ///
    /// A date where some asset did not trade keeps only the assets that did.
    pub fn from_closes<I>(closes: I) -> Self
    where
        I: IntoIterator<Item = (AssetKey, Vec<DailyClose>)>,
    {
        let mut by_date: BTreeMap<NaiveDate, BTreeMap<AssetKey, f64>> = BTreeMap::new();
        for (key, rows) in closes {
            for row in rows {
                by_date.entry(row.date).or_default().insert(key, row.close);
            }
        }

        let points = by_date
            .into_iter()
            .map(|(date, prices)| PricePoint { date, prices })
            .collect();
        Self { points }
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.iter().map(|p| p.date).max()
    }

    fn is_ascending(&self) -> bool {
        self.points.windows(2).all(|w| w[0].date <= w[1].date)
    }
}

impl FromIterator<PricePoint> for PriceSeries {
    fn from_iter<I: IntoIterator<Item = PricePoint>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

// ============================================================================
// Price Snapshot
// ============================================================================

/// Prices as of a date. `effective_date` is the session actually used and
/// is never after the requested target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub effective_date: NaiveDate,
    pub prices: BTreeMap<AssetKey, f64>,
}

impl PriceSnapshot {
    pub fn new(effective_date: NaiveDate, prices: BTreeMap<AssetKey, f64>) -> Self {
        Self {
            effective_date,
            prices,
        }
    }

    pub fn get(&self, key: AssetKey) -> Option<f64> {
        self.prices.get(&key).copied()
    }

    /// Fail on the first asset of `tickers` (in `AssetKey::ALL` order) with
    /// no price in this snapshot.
    pub fn ensure_complete(&self, tickers: &TickerMap, role: SnapshotRole) -> Result<(), GemError> {
        match AssetKey::ALL
            .into_iter()
            .find(|key| tickers.contains(*key) && !self.prices.contains_key(key))
        {
            Some(key) => Err(GemError::MissingAsset { key, role }),
            None => Ok(()),
        }
    }
}

/// Latest row of `series` dated on or before `target`.
///
/// Ties on the same date resolve to the row that appears last.
pub fn resolve(series: &PriceSeries, target: NaiveDate) -> Result<PriceSnapshot, GemError> {
    let point = if series.is_ascending() {
        let idx = series.points.partition_point(|p| p.date <= target);
        idx.checked_sub(1).map(|i| &series.points[i])
    } else {
        tracing::warn!(points = series.len(), "Price series not sorted by date, sorting");
        let mut sorted: Vec<&PricePoint> = series.points.iter().collect();
        sorted.sort_by_key(|p| p.date);
        let idx = sorted.partition_point(|p| p.date <= target);
        idx.checked_sub(1).map(|i| sorted[i])
    };

    point
        .map(|p| PriceSnapshot::new(p.date, p.prices.clone()))
        .ok_or(GemError::NoData { target })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn point(date: NaiveDate, us: f64) -> PricePoint {
        PricePoint {
            date,
            prices: [(AssetKey::Us, us)].into_iter().collect(),
        }
    }

    #[test]
    fn test_asset_key_parse_and_display() {
        for key in AssetKey::ALL {
            assert_eq!(key.as_str().parse::<AssetKey>().unwrap(), key);
            assert_eq!(key.to_string(), key.as_str());
        }
        assert!("us".parse::<AssetKey>().is_err());
        assert_eq!(serde_json::to_string(&AssetKey::CashProxy).unwrap(), "\"CASH_PROXY\"");
    }

    #[test]
    fn test_ticker_map_from_config() {
        let config = gem_common::Config::default();
        let tickers = TickerMap::from_config(&config.tickers).unwrap();
        assert_eq!(tickers.len(), 4);
        assert_eq!(tickers.get(AssetKey::ExUs), Some("VEU"));

        let mut bad = config.tickers.clone();
        bad.insert("GOLD".into(), "GLD".into());
        let err = TickerMap::from_config(&bad).unwrap_err();
        assert_eq!(err.0, "GOLD");
    }

    #[test]
    fn test_resolve_picks_latest_on_or_before_target() {
        let series: PriceSeries = [
            point(d(2024, 1, 2), 1.0),
            point(d(2024, 1, 3), 2.0),
            point(d(2024, 1, 5), 3.0),
        ]
        .into_iter()
        .collect();

        let snap = resolve(&series, d(2024, 1, 4)).unwrap();
        assert_eq!(snap.effective_date, d(2024, 1, 3));
        assert_eq!(snap.get(AssetKey::Us), Some(2.0));

        let exact = resolve(&series, d(2024, 1, 5)).unwrap();
        assert_eq!(exact.effective_date, d(2024, 1, 5));

        let after = resolve(&series, d(2024, 2, 1)).unwrap();
        assert_eq!(after.effective_date, d(2024, 1, 5));
    }

    #[test]
    fn test_resolve_before_all_entries_is_no_data() {
        let series: PriceSeries = [point(d(2024, 1, 2), 1.0)].into_iter().collect();
        let err = resolve(&series, d(2024, 1, 1)).unwrap_err();
        assert_eq!(err, GemError::NoData { target: d(2024, 1, 1) });

        let empty = PriceSeries::default();
        assert!(matches!(resolve(&empty, d(2024, 1, 1)), Err(GemError::NoData { .. })));
    }

    #[test]
    fn test_resolve_unsorted_matches_sorted() {
        let sorted: PriceSeries = [
            point(d(2024, 1, 2), 1.0),
            point(d(2024, 1, 3), 2.0),
            point(d(2024, 1, 5), 3.0),
        ]
        .into_iter()
        .collect();
        let shuffled: PriceSeries = [
            point(d(2024, 1, 5), 3.0),
            point(d(2024, 1, 2), 1.0),
            point(d(2024, 1, 3), 2.0),
        ]
        .into_iter()
        .collect();

        for target in [d(2024, 1, 2), d(2024, 1, 4), d(2024, 1, 9)] {
            assert_eq!(resolve(&sorted, target), resolve(&shuffled, target));
        }
        assert!(resolve(&shuffled, d(2023, 12, 31)).is_err());
    }

    #[test]
    fn test_from_closes_merges_by_date() {
        let close = |y, m, day, close| DailyClose { date: d(y, m, day), close };
        let series = PriceSeries::from_closes([
            (AssetKey::Us, vec![close(2024, 1, 3, 11.0), close(2024, 1, 2, 10.0)]),
            (AssetKey::Bonds, vec![close(2024, 1, 2, 50.0)]),
        ]);

        assert_eq!(series.len(), 2);
        assert_eq!(series.points()[0].date, d(2024, 1, 2));
        assert_eq!(series.points()[0].prices.len(), 2);
        assert_eq!(series.points()[1].prices.get(&AssetKey::Bonds), None);
    }

    #[test]
    fn test_ensure_complete_names_first_missing_key() {
        let tickers: TickerMap = AssetKey::ALL.into_iter().map(|k| (k, k.as_str())).collect();
        let snap = PriceSnapshot::new(
            d(2024, 1, 3),
            [(AssetKey::Us, 1.0), (AssetKey::CashProxy, 1.0)].into_iter().collect(),
        );

        let err = snap.ensure_complete(&tickers, SnapshotRole::Current).unwrap_err();
        assert_eq!(
            err,
            GemError::MissingAsset {
                key: AssetKey::ExUs,
                role: SnapshotRole::Current
            }
        );

        let partial: TickerMap = [(AssetKey::Us, "SPY"), (AssetKey::CashProxy, "BIL")]
            .into_iter()
            .collect();
        assert!(snap.ensure_complete(&partial, SnapshotRole::Previous).is_ok());
    }
}
