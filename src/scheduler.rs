//! The recurrence engine: `spec.md` §4.2.
//!
//! Wakes on a fixed interval, scans due schedules, advances them, and
//! produces jobs into the queue. Cron parsing and `cronNext` use the `cron`
//! crate, accepting both 5-field and 6-field expressions by prefixing a
//! `"0 "` seconds field when the input has five space-separated fields.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::watch;

use crate::store::JobStore;
use crate::store::models::JobType;

/// Default tick interval: `spec.md` §4.2.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(30);

/// Recovery floor applied when a schedule's job was created but the advance
/// write failed (I6).
const RECOVERY_FLOOR: chrono::Duration = chrono::Duration::hours(1);

/// Compute the smallest timestamp strictly greater than `from` that
/// satisfies `expr`, or `None` if the expression cannot be parsed or
/// produces no upcoming occurrence.
pub fn cron_next(expr: &str, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let full_expr = if expr.split_whitespace().count() == 5 { format!("0 {expr}") } else { expr.to_string() };

    let schedule = cron::Schedule::from_str(&full_expr).ok()?;
    schedule.after(&from).next()
}

/// Drives the recurrence engine. See `spec.md` §4.2.
pub struct Scheduler {
    store: JobStore,
    default_chat: i64,
    tick_interval: Duration,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
}

impl Scheduler {
    pub fn new(store: JobStore, default_chat: i64) -> Arc<Self> {
        Self::with_interval(store, default_chat, DEFAULT_TICK_INTERVAL)
    }

    pub fn with_interval(store: JobStore, default_chat: i64, tick_interval: Duration) -> Arc<Self> {
        let (stop_tx, stop_rx) = watch::channel(false);
        Arc::new(Self { store, default_chat, tick_interval, stop_tx, stop_rx })
    }

    /// Spawn the tick loop as its own task. Returns immediately.
    pub fn spawn(self: &Arc<Self>) {
        let scheduler = Arc::clone(self);
        let mut stop_rx = self.stop_rx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(scheduler.tick_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let now = Utc::now();
                        if let Err(e) = scheduler.run_tick(now) {
                            tracing::error!(error = %e, "scheduler tick failed");
                        }
                    }
                    Ok(()) = stop_rx.changed() => {
                        if *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });
    }

    /// Request the tick loop to stop after finishing its current tick.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Run one scan-and-advance cycle against `now`. Exposed separately from
    /// [`Self::spawn`] so it can be driven directly from tests.
    pub fn run_tick(&self, now: DateTime<Utc>) -> Result<(), crate::error::StorageFailure> {
        let due = self.store.due_schedules(now.timestamp_millis())?;

        for schedule in due {
            let next_run = cron_next(&schedule.parsed_cron, now);

            let Some(next_run) = next_run else {
                // I5: parse failure or no future occurrence — disable and move on.
                self.store.set_schedule_enabled(&schedule.id, false, None)?;
                tracing::warn!(schedule = %schedule.id, cron = %schedule.parsed_cron, "disabling schedule: cron produced no next fire time");
                continue;
            };

            let job_result = self.store.create_job(JobType::Task, schedule.prompt.clone(), self.default_chat, Some(schedule.id.clone()));

            match job_result {
                Ok(_job) => {
                    if let Err(e) = self.store.advance_schedule(&schedule.id, next_run.timestamp_millis(), now.timestamp_millis()) {
                        // I6: job created, advance failed — recovery floor.
                        tracing::error!(schedule = %schedule.id, error = %e, "advance_schedule failed after job creation, applying recovery floor");
                        let floor = now + RECOVERY_FLOOR;
                        self.store.set_schedule_enabled(&schedule.id, true, Some(floor.timestamp_millis()))?;
                    }
                }
                Err(e) => {
                    tracing::error!(schedule = %schedule.id, error = %e, "create_job failed, applying recovery floor");
                    let floor = now + RECOVERY_FLOOR;
                    self.store.set_schedule_enabled(&schedule.id, true, Some(floor.timestamp_millis()))?;
                }
            }
        }

        Ok(())
    }
}
