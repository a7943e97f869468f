//! Monthly decision report.
//!
//! A `ReportContext` is built from the decision and bound to two Handlebars
//! templates: a Markdown body (archived and sent as the plain-text part) and
//! an HTML email. Markdown output is not escaped; HTML output is.

use chrono::NaiveDate;
use handlebars::Handlebars;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::data::{AssetKey, TickerMap};
use crate::strategy::{Decision, Mode};

const MARKDOWN_TEMPLATE: &str = "report_md";
const HTML_TEMPLATE: &str = "report_html";

/// Report rendering and archiving errors.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Invalid report template: {0}")]
    Template(#[from] Box<handlebars::TemplateError>),

    #[error("Failed to render report: {0}")]
    Render(#[from] handlebars::RenderError),

    #[error("Failed to write report {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One line of the results table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub asset: AssetKey,
    pub label: &'static str,
    pub ticker: String,
    pub momentum: String,
    pub signal: &'static str,
}

/// Template data for one report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportContext {
    pub period: String,
    pub analysis_date: String,
    pub current_session: String,
    pub previous_session: String,
    pub lookback_months: u32,
    pub mode: Mode,
    pub risk_on: bool,
    pub selected_asset: AssetKey,
    pub selected_ticker: String,
    pub us_return: String,
    pub exus_return: String,
    pub cash_return: String,
    pub bonds_defaulted: bool,
    pub rows: Vec<ReportRow>,
}

impl ReportContext {
    pub fn build(
        decision: &Decision,
        analysis_date: NaiveDate,
        lookback_months: u32,
        tickers: &TickerMap,
    ) -> Self {
        let momentum = &decision.momentum;
        let rows = momentum
            .iter()
            .map(|(asset, value)| ReportRow {
                asset,
                label: asset.label(),
                ticker: tickers.get(asset).unwrap_or("-").to_string(),
                momentum: format_pct(value),
                signal: signal_for(decision, asset),
            })
            .collect();

        Self {
            period: analysis_date.format("%Y-%m").to_string(),
            analysis_date: analysis_date.format("%Y-%m-%d").to_string(),
            current_session: decision.prices_current.effective_date.to_string(),
            previous_session: decision.prices_prev.effective_date.to_string(),
            lookback_months,
            mode: decision.mode,
            risk_on: decision.mode.is_risk_on(),
            selected_asset: decision.selected_asset,
            selected_ticker: decision.selected_ticker.clone(),
            us_return: format_pct(momentum.us),
            exus_return: format_pct(momentum.exus),
            cash_return: format_pct(momentum.cash_proxy),
            bonds_defaulted: momentum.bonds_defaulted(),
            rows,
        }
    }
}

/// Signal column of the results table.
///
/// Equity rows carry a signal only in RISK-ON, the bond row only in
/// RISK-OFF. The cash proxy is always the benchmark.
pub fn signal_for(decision: &Decision, asset: AssetKey) -> &'static str {
    let selected = decision.selected_asset == asset;
    match (asset, decision.mode) {
        (AssetKey::CashProxy, _) => "(Benchmark)",
        (AssetKey::Us | AssetKey::ExUs, Mode::RiskOn) | (AssetKey::Bonds, Mode::RiskOff) => {
            if selected {
                "BUY"
            } else {
                "HOLD/SELL"
            }
        }
        _ => "-",
    }
}

/// `0.1234` → `12.34%`
pub fn format_pct(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

/// Email subject, `"{prefix} - YYYY-MM (MODE)"`.
pub fn subject(prefix: &str, analysis_date: NaiveDate, mode: Mode) -> String {
    format!("{} - {} ({})", prefix, analysis_date.format("%Y-%m"), mode)
}

/// Markdown and HTML renderings of one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReport {
    pub markdown: String,
    pub html: String,
}

/// Renders decision reports from the bundled templates.
pub struct ReportRenderer {
    markdown: Handlebars<'static>,
    html: Handlebars<'static>,
}

impl ReportRenderer {
    pub fn new() -> Result<Self, ReportError> {
        Self::with_templates(
            include_str!("../templates/report.md.hbs"),
            include_str!("../templates/email.html.hbs"),
        )
    }

    /// Use custom templates. Both receive a `ReportContext`.
    pub fn with_templates(markdown_tpl: &str, html_tpl: &str) -> Result<Self, ReportError> {
        let mut markdown = Handlebars::new();
        markdown.set_strict_mode(true);
        markdown.register_escape_fn(handlebars::no_escape);
        markdown
            .register_template_string(MARKDOWN_TEMPLATE, markdown_tpl)
            .map_err(Box::new)?;

        let mut html = Handlebars::new();
        html.set_strict_mode(true);
        html.register_template_string(HTML_TEMPLATE, html_tpl)
            .map_err(Box::new)?;

        Ok(Self { markdown, html })
    }

    pub fn render_markdown(&self, ctx: &ReportContext) -> Result<String, ReportError> {
        Ok(self.markdown.render(MARKDOWN_TEMPLATE, ctx)?)
    }

    pub fn render_html(&self, ctx: &ReportContext) -> Result<String, ReportError> {
        Ok(self.html.render(HTML_TEMPLATE, ctx)?)
    }

    pub fn render(&self, ctx: &ReportContext) -> Result<RenderedReport, ReportError> {
        Ok(RenderedReport {
            markdown: self.render_markdown(ctx)?,
            html: self.render_html(ctx)?,
        })
    }
}

/// Write `content` to `{dir}/{period}.md`, replacing an earlier report for
/// the same month.
pub fn save_report(dir: &Path, period: &str, content: &str) -> Result<PathBuf, ReportError> {
    let path = dir.join(format!("{}.md", period));
    let io_err = |source| ReportError::Io {
        path: path.clone(),
        source,
    };

    fs::create_dir_all(dir).map_err(io_err)?;
    fs::write(&path, content).map_err(io_err)?;
    tracing::debug!(path = %path.display(), "Report saved");
    Ok(path)
}
