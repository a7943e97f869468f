//! End-to-end monthly run against in-memory collaborators.
//!
//! Drives `GemPipeline` with a mock price provider and a recording notifier
//! and checks the decision, the archived report and the history log.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use tempfile::TempDir;

use gem_common::Config;
use gem_etf::data::{DailyClose, PriceProvider, ProviderError};
use gem_etf::{
    AssetKey, DeliveryReceipt, DeliveryStatus, EmailMessage, GemError, GemPipeline, HistoryLog,
    Mode, Notifier, NotifyError, RunOptions, SnapshotRole,
};

// ============================================================================
// Mock Collaborators
// ============================================================================

/// Serves fixed closes per symbol and counts calls
struct MockProvider {
    closes: HashMap<String, Vec<DailyClose>>,
    calls: AtomicU32,
}

impl MockProvider {
    fn new(closes: &[(&str, &[(NaiveDate, f64)])]) -> Self {
        let closes = closes
            .iter()
            .map(|(symbol, rows)| {
                let rows = rows
                    .iter()
                    .map(|&(date, close)| DailyClose { date, close })
                    .collect();
                (symbol.to_string(), rows)
            })
            .collect();
        Self {
            closes,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl PriceProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn fetch_daily_closes(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyClose>, ProviderError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .closes
            .get(symbol)
            .map(|rows| {
                rows.iter()
                    .filter(|r| r.date >= start && r.date <= end)
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Records every message; optionally fails every send
struct RecordingNotifier {
    sent: Mutex<Vec<EmailMessage>>,
    should_fail: bool,
}

impl RecordingNotifier {
    fn new(should_fail: bool) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            should_fail,
        }
    }

    fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, message: &EmailMessage) -> Result<DeliveryReceipt, NotifyError> {
        self.sent.lock().unwrap().push(message.clone());
        if self.should_fail {
            Err(NotifyError::Http {
                status: 503,
                body: "unavailable".into(),
            })
        } else {
            Ok(DeliveryReceipt {
                id: "msg-1".into(),
            })
        }
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// Run date whose analysis month is February 2024
fn today() -> NaiveDate {
    d(2024, 3, 5)
}

fn config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.email.from = "gem@example.com".into();
    config.email.to = "me@example.com".into();
    config.storage.reports_dir = Some(dir.path().join("reports"));
    config.storage.history_path = Some(dir.path().join("decisions.csv"));
    config
}

/// US +10%, EXUS +5%, BONDS flat, CASH +2% between 2023-02-28 and 2024-02-29
fn risk_on_provider() -> MockProvider {
    MockProvider::new(&[
        ("SPY", &[(d(2023, 2, 27), 398.0), (d(2023, 2, 28), 400.0), (d(2024, 2, 29), 440.0)]),
        ("VEU", &[(d(2023, 2, 28), 50.0), (d(2024, 2, 29), 52.5)]),
        ("AGG", &[(d(2023, 2, 28), 100.0), (d(2024, 2, 29), 100.0)]),
        ("BIL", &[(d(2023, 2, 28), 90.0), (d(2024, 2, 29), 91.8)]),
    ])
}

/// US -5% against flat cash
fn risk_off_provider() -> MockProvider {
    MockProvider::new(&[
        ("SPY", &[(d(2023, 2, 28), 400.0), (d(2024, 2, 29), 380.0)]),
        ("VEU", &[(d(2023, 2, 28), 50.0), (d(2024, 2, 29), 60.0)]),
        ("AGG", &[(d(2023, 2, 28), 100.0), (d(2024, 2, 29), 103.0)]),
        ("BIL", &[(d(2023, 2, 28), 90.0), (d(2024, 2, 29), 90.0)]),
    ])
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_full_run_risk_on() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let provider = Arc::new(risk_on_provider());
    let notifier = Arc::new(RecordingNotifier::new(false));

    let pipeline = GemPipeline::new(&config, provider.clone(), notifier.clone()).unwrap();
    let summary = pipeline.run(RunOptions::new(today())).await.unwrap();

    assert_eq!(provider.calls.load(Ordering::Relaxed), 4);
    assert_eq!(summary.window.analysis_date, d(2024, 2, 29));
    assert_eq!(summary.window.comparison_date, d(2023, 2, 28));
    assert_eq!(summary.decision.mode, Mode::RiskOn);
    assert_eq!(summary.decision.selected_asset, AssetKey::Us);
    assert_eq!(summary.decision.selected_ticker, "SPY");
    assert!((summary.decision.momentum.us - 0.10).abs() < 1e-9);
    assert_eq!(summary.delivery, DeliveryStatus::Sent { id: "msg-1".into() });
    assert!(summary.history_appended);

    let report_path = summary.report_path.clone().unwrap();
    assert_eq!(report_path, dir.path().join("reports").join("2024-02.md"));
    let report = std::fs::read_to_string(&report_path).unwrap();
    assert!(report.contains("| US Equities | SPY | 10.00% | BUY |"));

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "GEM ETF Decision - 2024-02 (RISK-ON)");
    assert_eq!(sent[0].to, vec!["me@example.com".to_string()]);
    assert_eq!(sent[0].text, report);
    assert!(sent[0].html.contains("risk-on"));

    let history = HistoryLog::new(config.history_path()).read_all().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].date, d(2024, 2, 29));
    assert_eq!(history[0].ticker, "SPY");
    assert_eq!(history[0].mode, Mode::RiskOn);
}

#[tokio::test]
async fn test_risk_off_selects_bonds() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = GemPipeline::new(
        &config(&dir),
        Arc::new(risk_off_provider()),
        Arc::new(RecordingNotifier::new(false)),
    )
    .unwrap();

    let summary = pipeline.run(RunOptions::new(today())).await.unwrap();
    assert_eq!(summary.decision.mode, Mode::RiskOff);
    assert_eq!(summary.decision.selected_ticker, "AGG");
    assert_eq!(summary.subject, "GEM ETF Decision - 2024-02 (RISK-OFF)");
    assert!(summary.report_markdown.contains("| Bonds | AGG | 3.00% | BUY |"));
}

#[tokio::test]
async fn test_notifier_failure_keeps_decision_and_history() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let pipeline = GemPipeline::new(
        &config,
        Arc::new(risk_on_provider()),
        Arc::new(RecordingNotifier::new(true)),
    )
    .unwrap();

    let summary = pipeline.run(RunOptions::new(today())).await.unwrap();
    assert_eq!(summary.decision.selected_asset, AssetKey::Us);
    assert!(matches!(summary.delivery, DeliveryStatus::Failed { .. }));
    assert!(summary.history_appended);
    assert_eq!(HistoryLog::new(config.history_path()).read_all().unwrap().len(), 1);
}

#[tokio::test]
async fn test_dry_run_has_no_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let notifier = Arc::new(RecordingNotifier::new(false));
    let pipeline =
        GemPipeline::new(&config, Arc::new(risk_on_provider()), notifier.clone()).unwrap();

    let summary = pipeline.run(RunOptions::new(today()).dry_run(true)).await.unwrap();
    assert_eq!(summary.decision.selected_ticker, "SPY");
    assert_eq!(summary.delivery, DeliveryStatus::NotAttempted);
    assert!(summary.report_path.is_none());
    assert!(!summary.history_appended);
    assert!(summary.report_markdown.contains("RISK-ON"));

    assert!(notifier.sent().is_empty());
    assert!(!config.history_path().exists());
    assert!(!config.reports_dir().exists());
}

#[tokio::test]
async fn test_email_disabled_is_not_attempted() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(&dir);
    config.email.enabled = false;
    let notifier = Arc::new(RecordingNotifier::new(false));
    let pipeline =
        GemPipeline::new(&config, Arc::new(risk_on_provider()), notifier.clone()).unwrap();

    let summary = pipeline.run(RunOptions::new(today())).await.unwrap();
    assert_eq!(summary.delivery, DeliveryStatus::NotAttempted);
    assert!(notifier.sent().is_empty());
    assert!(summary.history_appended);
}

#[tokio::test]
async fn test_repeated_runs_append_history() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let pipeline = GemPipeline::new(
        &config,
        Arc::new(risk_on_provider()),
        Arc::new(RecordingNotifier::new(false)),
    )
    .unwrap();

    pipeline.run(RunOptions::new(today())).await.unwrap();
    pipeline.run(RunOptions::new(d(2024, 3, 20))).await.unwrap();

    let content = std::fs::read_to_string(config.history_path()).unwrap();
    assert_eq!(content.lines().filter(|l| l.starts_with("date,")).count(), 1);
    assert_eq!(content.lines().count(), 3);
}

#[tokio::test]
async fn test_missing_lookback_price_aborts_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    // VEU listed after the look-back date
    let provider = MockProvider::new(&[
        ("SPY", &[(d(2023, 2, 28), 400.0), (d(2024, 2, 29), 440.0)]),
        ("VEU", &[(d(2023, 6, 1), 50.0), (d(2024, 2, 29), 52.5)]),
        ("AGG", &[(d(2023, 2, 28), 100.0), (d(2024, 2, 29), 100.0)]),
        ("BIL", &[(d(2023, 2, 28), 90.0), (d(2024, 2, 29), 91.8)]),
    ]);
    let notifier = Arc::new(RecordingNotifier::new(false));
    let pipeline = GemPipeline::new(&config, Arc::new(provider), notifier.clone()).unwrap();

    let err = pipeline.run(RunOptions::new(today())).await.unwrap_err();
    assert_eq!(
        err.downcast_ref::<GemError>(),
        Some(&GemError::MissingAsset {
            key: AssetKey::ExUs,
            role: SnapshotRole::Previous
        })
    );
    assert!(notifier.sent().is_empty());
    assert!(!config.history_path().exists());
}

#[tokio::test]
async fn test_no_prices_before_lookback_is_no_data() {
    let dir = tempfile::tempdir().unwrap();
    let provider = MockProvider::new(&[
        ("SPY", &[(d(2024, 2, 29), 440.0)]),
        ("VEU", &[(d(2024, 2, 29), 52.5)]),
        ("AGG", &[(d(2024, 2, 29), 100.0)]),
        ("BIL", &[(d(2024, 2, 29), 91.8)]),
    ]);
    let pipeline = GemPipeline::new(
        &config(&dir),
        Arc::new(provider),
        Arc::new(RecordingNotifier::new(false)),
    )
    .unwrap();

    let err = pipeline.run(RunOptions::new(today())).await.unwrap_err();
    assert_eq!(
        err.downcast_ref::<GemError>(),
        Some(&GemError::NoData { target: d(2023, 2, 28) })
    );
}

#[tokio::test]
async fn test_empty_provider_result_fails() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = GemPipeline::new(
        &config(&dir),
        Arc::new(MockProvider::new(&[])),
        Arc::new(RecordingNotifier::new(false)),
    )
    .unwrap();

    let err = pipeline.run(RunOptions::new(today())).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ProviderError>(),
        Some(ProviderError::DataNotAvailable(_))
    ));
}

#[test]
fn test_invalid_config_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(&dir);
    config.tickers.remove("BONDS");

    let result = GemPipeline::new(
        &config,
        Arc::new(risk_on_provider()),
        Arc::new(RecordingNotifier::new(false)),
    );
    assert!(result.is_err());
}
