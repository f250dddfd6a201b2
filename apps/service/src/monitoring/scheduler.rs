use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use super::history::HistoryRecorder;
use super::incidents::{IncidentManager, IncidentTransition};
use super::prober::Prober;
use super::selector::DueSelector;
use super::types::{MonitorStatus, Outcome};
use crate::clock::Clock;
use crate::config::SchedulerConfig;
use crate::database::models::Monitor;
use crate::database::{MonitorStore, Stores};

/// Result of checking one monitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub monitor_id: i64,
    pub status: MonitorStatus,
    pub outcome: Outcome,
    pub transition: IncidentTransition,
}

/// What one cycle did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    pub due: usize,
    pub up: usize,
    pub down: usize,
    /// Monitors whose check could not be completed (persistence failures)
    pub failed: usize,
    pub incidents_opened: usize,
    pub incidents_resolved: usize,
    /// Completed checks, in completion order
    pub checks: Vec<CheckReport>,
}

/// Monitoring scheduler - drives due monitors through probe, history and incidents.
///
/// Cycles run back to back with a fixed delay measured from the end of the
/// previous cycle, so two cycles never overlap.
pub struct Scheduler {
    selector: DueSelector,
    prober: Arc<dyn Prober>,
    history: HistoryRecorder,
    incidents: IncidentManager,
    monitors: Arc<dyn MonitorStore>,
    clock: Arc<dyn Clock>,
    cycle_delay: Duration,
    max_concurrent_checks: usize,
}

impl Scheduler {
    pub fn new(
        stores: &Stores,
        prober: Arc<dyn Prober>,
        clock: Arc<dyn Clock>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            selector: DueSelector::new(stores.monitors.clone()),
            prober,
            history: HistoryRecorder::new(stores.history.clone(), clock.clone()),
            incidents: IncidentManager::new(stores.incidents.clone(), clock.clone()),
            monitors: stores.monitors.clone(),
            clock,
            cycle_delay: config.cycle_delay(),
            max_concurrent_checks: config.max_concurrent_checks.max(1),
        }
    }

    /// Run one cycle: select due monitors and check each of them.
    ///
    /// Only a failing due-selection fails the cycle; a monitor whose check
    /// cannot be persisted is logged and counted, and the rest still run.
    pub async fn run_cycle(&self) -> Result<CycleSummary> {
        let now = self.clock.now();
        let due = self.selector.select_due(now).await.context("Failed to select due monitors")?;

        let mut summary = CycleSummary { due: due.len(), ..CycleSummary::default() };
        if due.is_empty() {
            debug!("No monitors due");
            return Ok(summary);
        }

        info!("Checking {} due monitors", due.len());

        // A batch holds each monitor at most once, so no monitor is ever
        // checked by two tasks at the same time.
        let mut checks = futures::stream::iter(due)
            .map(|monitor| async move {
                let monitor_id = monitor.id;
                (monitor_id, self.check_monitor(monitor).await)
            })
            .buffer_unordered(self.max_concurrent_checks);

        while let Some((monitor_id, result)) = checks.next().await {
            match result {
                Ok(report) => {
                    match report.status {
                        MonitorStatus::Up => summary.up += 1,
                        MonitorStatus::Down => summary.down += 1,
                    }
                    match report.transition {
                        IncidentTransition::Opened(_) => summary.incidents_opened += 1,
                        IncidentTransition::Resolved(_) => summary.incidents_resolved += 1,
                        IncidentTransition::Unchanged => {}
                    }
                    summary.checks.push(report);
                }
                Err(e) => {
                    summary.failed += 1;
                    error!(monitor_id, "Check failed: {e:#}");
                }
            }
        }

        info!(
            due = summary.due,
            up = summary.up,
            down = summary.down,
            failed = summary.failed,
            opened = summary.incidents_opened,
            resolved = summary.incidents_resolved,
            "Cycle finished"
        );
        Ok(summary)
    }

    /// Probe one monitor, record the outcome, update incidents, then stamp
    /// `last_checked_at` with the time this check completed.
    async fn check_monitor(&self, monitor: Monitor) -> Result<CheckReport> {
        let monitor_id = monitor.persisted_id()?;

        let outcome = self.prober.probe(&monitor.url).await;
        let status = outcome.status.verdict();
        let success = outcome.is_up();

        match status {
            MonitorStatus::Up => info!(
                monitor_id,
                url = %monitor.url,
                status_code = outcome.status.legacy_code(),
                elapsed_ms = outcome.elapsed_ms,
                "[{}] {} - {}",
                status,
                monitor.name,
                outcome.status
            ),
            MonitorStatus::Down => warn!(
                monitor_id,
                url = %monitor.url,
                status_code = outcome.status.legacy_code(),
                elapsed_ms = outcome.elapsed_ms,
                "[{}] {} - {}",
                status,
                monitor.name,
                outcome.status
            ),
        }

        self.history
            .record(&monitor, outcome.status.code(), outcome.elapsed_ms, success)
            .await
            .context("Failed to record check history")?;

        let transition = match outcome.status.failure_reason() {
            None => self.incidents.on_up(&monitor).await,
            Some(reason) => self.incidents.on_down(&monitor, &reason).await,
        }
        .context("Failed to update incident state")?;

        let completed_at = self.clock.now();
        self.monitors
            .touch_last_checked(monitor_id, completed_at)
            .await
            .context("Failed to store last checked time")?;

        Ok(CheckReport { monitor_id, status, outcome, transition })
    }

    /// Spawn the loop on the tokio runtime
    pub fn start(self: Arc<Self>) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            info!("Scheduler started (cycle delay {:?})", self.cycle_delay);

            loop {
                if *shutdown_rx.borrow() {
                    break;
                }

                if let Err(e) = self.run_cycle().await {
                    error!("Cycle aborted: {e:#}");
                }

                tokio::select! {
                    _ = tokio::time::sleep(self.cycle_delay) => {}
                    _ = shutdown_rx.changed() => break,
                }
            }

            info!("Scheduler stopped");
        });

        SchedulerHandle { shutdown_tx, task }
    }
}

/// Owns a running scheduler loop. Dropping the handle also ends the loop
/// after the current cycle.
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Ask the loop to stop and wait for it. A cycle in progress is allowed
    /// to finish first.
    pub async fn stop(self) -> Result<(), JoinError> {
        let _ = self.shutdown_tx.send(true);
        self.task.await
    }
}
