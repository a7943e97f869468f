//! Monthly run orchestration.
//!
//! One run: resolve the analysis window, fetch prices, take the two as-of
//! snapshots, decide, render and archive the report, email it, and append
//! the decision to the history log.
//!
//! A failure before the decision aborts the run with no side effects. After
//! the decision exists, a failed email is recorded in the summary and the
//! history row is still written.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use gem_common::Config;

use crate::calendar::AnalysisWindow;
use crate::data::{resolve, PriceProvider, TickerMap, YahooChartProvider};
use crate::error::SnapshotRole;
use crate::history::{HistoryLog, HistoryRecord};
use crate::notification::{EmailMessage, Notifier, ResendNotifier};
use crate::report::{self, ReportContext, ReportRenderer};
use crate::strategy::{decide, Decision};

/// Per-run inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Date the run is executed on; the analysis month is the one before
    pub today: NaiveDate,
    /// Compute and render only: no report file, email or history row
    pub dry_run: bool,
}

impl RunOptions {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Outcome of the email step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent { id: String },
    /// No API key configured
    Skipped,
    /// Email disabled or dry run
    NotAttempted,
    Failed { error: String },
}

/// Everything one run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub window: AnalysisWindow,
    pub decision: Decision,
    pub subject: String,
    pub report_markdown: String,
    pub report_path: Option<PathBuf>,
    pub delivery: DeliveryStatus,
    pub history_appended: bool,
}

/// Monthly GEM decision pipeline.
pub struct GemPipeline {
    provider: Arc<dyn PriceProvider>,
    notifier: Arc<dyn Notifier>,
    renderer: ReportRenderer,
    history: HistoryLog,
    tickers: TickerMap,
    lookback_months: u32,
    fetch_buffer_months: u32,
    reports_dir: PathBuf,
    email_enabled: bool,
    email_from: String,
    email_to: String,
    subject_prefix: String,
}

impl GemPipeline {
    /// Build a pipeline from a validated configuration and explicit
    /// collaborators.
    pub fn new(
        config: &Config,
        provider: Arc<dyn PriceProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        config.validate().context("Invalid configuration")?;

        let tickers = TickerMap::from_config(&config.tickers).context("Invalid ticker map")?;
        let renderer = ReportRenderer::new().context("Failed to load report templates")?;

        Ok(Self {
            provider,
            notifier,
            renderer,
            history: HistoryLog::new(config.history_path()),
            tickers,
            lookback_months: config.strategy.lookback_months,
            fetch_buffer_months: config.data.fetch_buffer_months,
            reports_dir: config.reports_dir(),
            email_enabled: config.email.enabled,
            email_from: config.email.from.clone(),
            email_to: config.email.to.clone(),
            subject_prefix: config.email.subject_prefix.clone(),
        })
    }

    /// Build with the Yahoo price provider and the Resend notifier.
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = Arc::new(YahooChartProvider::from_config(&config.data));
        let notifier = Arc::new(ResendNotifier::from_config(&config.email));
        Self::new(config, provider, notifier)
    }

    /// Execute one monthly run.
    pub async fn run(&self, options: RunOptions) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("gem_run", run_id = %run_id, today = %options.today);
        self.run_inner(run_id, options).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid, options: RunOptions) -> Result<RunSummary> {
        let window = AnalysisWindow::for_run(
            options.today,
            self.lookback_months,
            self.fetch_buffer_months,
        );
        info!(
            analysis_date = %window.analysis_date,
            comparison_date = %window.comparison_date,
            fetch_start = %window.fetch_start,
            dry_run = options.dry_run,
            "Starting GEM run"
        );

        let series = self
            .provider
            .fetch(&self.tickers, window.fetch_start, window.analysis_date)
            .await
            .map_err(|e| {
                warn!(
                    provider = self.provider.name(),
                    recoverable = e.is_recoverable(),
                    error = %e,
                    "Price fetch failed"
                );
                e
            })
            .with_context(|| format!("Failed to fetch prices from {}", self.provider.name()))?;
        info!(
            sessions = series.len(),
            last_session = ?series.last_date(),
            "Prices fetched"
        );

        let current =
            resolve(&series, window.analysis_date).context("Failed to resolve current prices")?;
        let previous = resolve(&series, window.comparison_date)
            .context("Failed to resolve look-back prices")?;
        current.ensure_complete(&self.tickers, SnapshotRole::Current)?;
        previous.ensure_complete(&self.tickers, SnapshotRole::Previous)?;

        info!(
            current_session = %current.effective_date,
            previous_session = %previous.effective_date,
            "Price snapshots resolved"
        );

        let decision = decide(&current, &previous, &self.tickers)?;
        info!(
            mode = %decision.mode,
            selected = %decision.selected_asset,
            ticker = %decision.selected_ticker,
            momentum_us = decision.momentum.us,
            momentum_exus = decision.momentum.exus,
            momentum_cash = decision.momentum.cash_proxy,
            "Decision calculated"
        );
        if decision.momentum.bonds_defaulted() {
            warn!("BONDS price missing, momentum defaulted to 0.0");
        }

        let ctx = ReportContext::build(
            &decision,
            window.analysis_date,
            self.lookback_months,
            &self.tickers,
        );
        let rendered = self.renderer.render(&ctx).context("Failed to render report")?;
        let subject = report::subject(&self.subject_prefix, window.analysis_date, decision.mode);

        if options.dry_run {
            info!(subject = %subject, "Dry run, skipping report archive, email and history");
            return Ok(RunSummary {
                run_id,
                window,
                decision,
                subject,
                report_markdown: rendered.markdown,
                report_path: None,
                delivery: DeliveryStatus::NotAttempted,
                history_appended: false,
            });
        }

        let report_path =
            report::save_report(&self.reports_dir, &window.period(), &rendered.markdown)
                .context("Failed to archive report")?;
        info!(path = %report_path.display(), "Report saved");

        let delivery = if self.email_enabled {
            let message = EmailMessage {
                from: self.email_from.clone(),
                to: vec![self.email_to.clone()],
                subject: subject.clone(),
                text: rendered.markdown.clone(),
                html: rendered.html,
            };
            match self.notifier.send(&message).await {
                Ok(receipt) if receipt.is_skipped() => DeliveryStatus::Skipped,
                Ok(receipt) => DeliveryStatus::Sent { id: receipt.id },
                Err(e) => {
                    warn!(notifier = self.notifier.name(), error = %e, "Email delivery failed");
                    DeliveryStatus::Failed { error: e.to_string() }
                }
            }
        } else {
            info!("Email disabled");
            DeliveryStatus::NotAttempted
        };

        let record = HistoryRecord::from_decision(&decision, window.analysis_date, Utc::now());
        self.history.append(&record).context("Failed to append decision history")?;
        info!(path = %self.history.path().display(), "History updated");

        Ok(RunSummary {
            run_id,
            window,
            decision,
            subject,
            report_markdown: rendered.markdown,
            report_path: Some(report_path),
            delivery,
            history_appended: true,
        })
    }
}
