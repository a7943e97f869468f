//! GEM ETF - monthly momentum allocation decision.
//!
//! ```text
//! gem-etf run [--date YYYY-MM-DD] [--dry-run]
//! gem-etf schedule
//! gem-etf check-config
//! ```

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use gem_common::config::Config;
use gem_common::logging::init_logging;
use gem_etf::{DeliveryStatus, GemPipeline, MonthlyScheduler, RunOptions};

/// Generalized Momentum ETF decision service.
#[derive(Parser, Debug)]
#[command(name = "gem-etf")]
#[command(version)]
#[command(about = "Monthly GEM (dual momentum) ETF decision and report.", long_about = None)]
struct Cli {
    /// Config file (default: ~/.gem-etf/config.json; .yaml/.yml accepted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the monthly decision once
    Run {
        /// Pretend today is this date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Compute and print the report without saving, emailing or logging history
        #[arg(long)]
        dry_run: bool,
    },

    /// Stay running and execute on the configured cron schedule
    Schedule,

    /// Validate the configuration and print it with secrets redacted
    CheckConfig,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        tracing::error!(error = ?e, "GEM ETF failed");
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let config =
        Config::load_with_env(cli.config.as_deref()).context("Failed to load configuration")?;

    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
        config.observability.log_file.as_deref(),
    )
    .context("Failed to open log file")?;

    tracing::info!("GEM ETF v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Run { date, dry_run } => {
            let today = date.unwrap_or_else(|| Local::now().date_naive());
            let pipeline = GemPipeline::from_config(&config)?;
            let summary = pipeline.run(RunOptions::new(today).dry_run(dry_run)).await?;

            if dry_run {
                println!("{}", summary.report_markdown);
            }
            if let DeliveryStatus::Failed { error } = &summary.delivery {
                tracing::warn!(error = %error, "Decision recorded but email was not delivered");
            }
            tracing::info!(
                run_id = %summary.run_id,
                subject = %summary.subject,
                "Execution completed"
            );
            Ok(())
        }
        Commands::Schedule => {
            if !config.schedule.enabled {
                anyhow::bail!("Scheduling is disabled (set schedule.enabled = true)");
            }
            let pipeline = Arc::new(GemPipeline::from_config(&config)?);
            MonthlyScheduler::new(&config.schedule, pipeline)?.run().await
        }
        Commands::CheckConfig => {
            config.validate().context("Configuration is invalid")?;
            let rendered = serde_json::to_string_pretty(&config.redacted())?;
            println!("{}", rendered);
            tracing::info!("Configuration is valid");
            Ok(())
        }
    }
}
