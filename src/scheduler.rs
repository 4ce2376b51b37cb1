use std::sync::Arc;

use chrono::Utc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::coordinator::Coordinator;
use crate::cron::CronSchedule;
use crate::models::ReminderKind;

/// Timing plumbing around the coordinator: one run at startup, then one per
/// cron instant until cancelled. Runs are spawned so a slow run never delays
/// the next tick; the coordinator's guard rejects overlaps.
pub struct Scheduler {
    coordinator: Arc<Coordinator>,
    schedule: CronSchedule,
    kinds: Vec<ReminderKind>,
    run_on_startup: bool,
}

impl Scheduler {
    pub fn new(coordinator: Arc<Coordinator>, schedule: CronSchedule, kinds: Vec<ReminderKind>) -> Self {
        Self {
            coordinator,
            schedule,
            kinds,
            run_on_startup: true,
        }
    }

    pub fn skip_startup_run(mut self) -> Self {
        self.run_on_startup = false;
        self
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            schedule = self.schedule.expression(),
            kinds = ?self.kinds,
            "reminder scheduler started"
        );
        let mut runs = JoinSet::new();

        if self.run_on_startup {
            tracing::info!("running notification job immediately on startup");
            self.trigger(&mut runs, &cancel);
        }

        loop {
            while runs.try_join_next().is_some() {}

            let now = Utc::now();
            let Some(next) = self.schedule.next_after(now) else {
                tracing::error!(schedule = self.schedule.expression(), "schedule has no upcoming run");
                break;
            };
            let wait = (next - now).to_std().unwrap_or_default();
            tracing::debug!(next_run = %next, "waiting for next scheduled run");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    tracing::info!("starting scheduled notification job");
                    self.trigger(&mut runs, &cancel);
                }
                _ = cancel.cancelled() => break,
            }
        }

        while runs.join_next().await.is_some() {}
        tracing::info!("reminder scheduler stopped");
    }

    fn trigger(&self, runs: &mut JoinSet<()>, cancel: &CancellationToken) {
        let coordinator = self.coordinator.clone();
        let kinds = self.kinds.clone();
        let cancel = cancel.clone();
        runs.spawn(async move {
            coordinator.run_cycle(&kinds, &cancel).await;
        });
    }
}
