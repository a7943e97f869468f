//! Cron scheduler for the monthly run.
//!
//! Keeps the process alive and triggers the pipeline at every fire time of
//! a six-field cron expression evaluated in UTC.
//!
//! # Schedule Configuration
//!
//! ```json
//! {
//!   "schedule": {
//!     "enabled": true,
//!     "cron": "0 0 7 1 * *"
//!   }
//! }
//! ```
//!
//! A failed run is logged and the scheduler waits for the next fire time.
//! A shutdown request that arrives mid-run lets that run finish first.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use cron::Schedule;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info};

use gem_common::ScheduleConfig;

use crate::pipeline::{GemPipeline, RunOptions};

/// Monthly pipeline scheduler
pub struct MonthlyScheduler {
    cron: String,
    schedule: Schedule,
    pipeline: Arc<GemPipeline>,
}

impl MonthlyScheduler {
    pub fn new(config: &ScheduleConfig, pipeline: Arc<GemPipeline>) -> Result<Self> {
        let schedule = Schedule::from_str(&config.cron)
            .with_context(|| format!("Invalid schedule cron: {}", config.cron))?;

        Ok(Self {
            cron: config.cron.clone(),
            schedule,
            pipeline,
        })
    }

    /// First fire time strictly after `after`.
    pub fn next_fire(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    /// Run until Ctrl-C.
    pub async fn run(&self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl-C");
            }
        })
        .await
    }

    /// Run until `shutdown` resolves.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!(cron = %self.cron, "Scheduler started");
        tokio::pin!(shutdown);

        loop {
            let now = Utc::now();
            let Some(fire_at) = self.next_fire(now) else {
                info!(cron = %self.cron, "Schedule has no upcoming fire time, stopping");
                return Ok(());
            };
            let wait = (fire_at - now).to_std().unwrap_or_default();
            info!(next_run = %fire_at, wait_secs = wait.as_secs(), "Waiting for next run");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = &mut shutdown => {
                    info!("Shutdown signal received, scheduler stopped");
                    return Ok(());
                }
            }

            let run = self.fire(fire_at);
            tokio::pin!(run);
            tokio::select! {
                _ = &mut run => {}
                _ = &mut shutdown => {
                    info!("Shutdown signal received, finishing current run");
                    run.await;
                    info!("Scheduler stopped");
                    return Ok(());
                }
            }
        }
    }

    async fn fire(&self, fire_at: DateTime<Utc>) {
        let options = RunOptions::new(fire_at.date_naive());
        match self.pipeline.run(options).await {
            Ok(summary) => info!(
                run_id = %summary.run_id,
                mode = %summary.decision.mode,
                ticker = %summary.decision.selected_ticker,
                "Scheduled run completed"
            ),
            Err(e) => error!(error = ?e, "Scheduled run failed"),
        }
    }
}
