//! Cycle scheduling
//!
//! Fires the orchestrator on a fixed beat or a cron calendar until shutdown.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use prospect_common::{SyncError, SyncResult};
use prospect_sync::Orchestrator;
use tracing::{info, warn};

use crate::startup::{ShutdownSignal, run_with_shutdown};

/// When cycles fire
#[derive(Debug, Clone)]
pub enum Trigger {
    /// A single cycle, then exit
    Once,
    /// Fixed beat between triggers
    Interval(Duration),
    /// Calendar expression
    Cron(Box<cron::Schedule>),
}

impl Trigger {
    pub fn every_hours(hours: u64) -> SyncResult<Self> {
        if hours == 0 {
            return Err(SyncError::configuration(
                "schedule.beat_hours must be at least 1",
            ));
        }
        Ok(Trigger::Interval(Duration::from_secs(hours * 3600)))
    }

    /// Parse a cron expression; 5-field expressions get a leading seconds field.
    pub fn cron(expression: &str) -> SyncResult<Self> {
        let expression = expression.trim();
        let normalized = match expression.split_whitespace().count() {
            5 => format!("0 {}", expression),
            6 | 7 => expression.to_string(),
            n => {
                return Err(SyncError::configuration(format!(
                    "schedule.cron '{}' has {} fields, expected 5 to 7",
                    expression, n
                )));
            }
        };

        cron::Schedule::from_str(&normalized)
            .map(|schedule| Trigger::Cron(Box::new(schedule)))
            .map_err(|e| {
                SyncError::configuration(format!("schedule.cron '{}': {}", expression, e))
            })
    }

    /// Delay from `now` until the next trigger; `None` when nothing follows.
    pub fn next_delay(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self {
            Trigger::Once => None,
            Trigger::Interval(beat) => Some(*beat),
            Trigger::Cron(schedule) => schedule
                .after(&now)
                .next()
                .map(|next| (next - now).to_std().unwrap_or(Duration::ZERO)),
        }
    }
}

/// Drives the orchestrator until the trigger runs out or shutdown is signalled
pub struct Scheduler {
    trigger: Trigger,
    run_on_startup: bool,
}

impl Scheduler {
    pub fn new(trigger: Trigger, run_on_startup: bool) -> Self {
        Self {
            trigger,
            run_on_startup,
        }
    }

    /// Run until the schedule ends or shutdown is signalled.
    ///
    /// Cycles already started are awaited before returning; none is cancelled.
    pub async fn run(&self, orchestrator: &Orchestrator, shutdown: &ShutdownSignal) {
        let mut shutdown_rx = shutdown.subscribe();

        if let Trigger::Once = self.trigger {
            for report in orchestrator.run_cycle().await {
                info!(
                    region = %report.region,
                    applied = report.applied(),
                    failed = report.failed(),
                    "Single cycle finished"
                );
                for entry in &report.entries {
                    if let Some(err) = entry.result.error() {
                        warn!(
                            region = %report.region,
                            sequence = entry.sequence,
                            key = %entry.key,
                            error = %err,
                            "Entry left unapplied"
                        );
                    }
                }
            }
            return;
        }

        if self.run_on_startup && !shutdown.is_shutdown() {
            orchestrator.trigger().await;
        }

        while !shutdown.is_shutdown() {
            let Some(delay) = self.trigger.next_delay(Utc::now()) else {
                warn!("Schedule has no further occurrences");
                break;
            };
            info!(delay_secs = delay.as_secs(), "Next cycle scheduled");

            if run_with_shutdown(tokio::time::sleep(delay), &mut shutdown_rx)
                .await
                .is_none()
            {
                break;
            }
            orchestrator.trigger().await;
        }

        info!("Scheduler stopped, waiting for running cycles to finish");
        orchestrator.wait_idle().await;
    }
}
