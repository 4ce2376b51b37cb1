use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::FixedOffset;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::cache::DedupCache;
use crate::clock::Clock;
use crate::composer::Composer;
use crate::error::StoreError;
use crate::gateway::Gateway;
use crate::models::{AuditRecord, CacheKey, DeliveryStatus, NotificationCandidate, ReminderKind};
use crate::window::{window_for, TimeWindow};

/// Lists students who still owe a task whose deadline falls in `window`,
/// oldest deadline first, excluding pairs already notified for `kind`.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    async fn pending_candidates(
        &self,
        kind: ReminderKind,
        window: &TimeWindow,
    ) -> Result<Vec<NotificationCandidate>, StoreError>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn record(&self, record: &AuditRecord) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub pacing: Duration,
    pub display_offset: FixedOffset,
    pub app_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    QueryFailed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub kind: ReminderKind,
    pub status: RunStatus,
    pub candidates: usize,
    pub delivered: usize,
    pub failed: usize,
    pub skipped_recent: usize,
    pub skipped_submitted: usize,
    pub audit_failures: usize,
}

impl RunReport {
    fn new(kind: ReminderKind) -> Self {
        Self {
            kind,
            status: RunStatus::Completed,
            candidates: 0,
            delivered: 0,
            failed: 0,
            skipped_recent: 0,
            skipped_submitted: 0,
            audit_failures: 0,
        }
    }

    pub fn attempted(&self) -> usize {
        self.delivered + self.failed
    }

    fn log(&self) {
        if self.status == RunStatus::Completed && self.failed == 0 && self.audit_failures == 0 {
            tracing::info!(
                kind = %self.kind,
                candidates = self.candidates,
                delivered = self.delivered,
                skipped = self.skipped_recent + self.skipped_submitted,
                "notification run finished"
            );
        } else {
            tracing::warn!(
                kind = %self.kind,
                status = ?self.status,
                candidates = self.candidates,
                delivered = self.delivered,
                failed = self.failed,
                skipped = self.skipped_recent + self.skipped_submitted,
                audit_failures = self.audit_failures,
                "notification run finished with problems"
            );
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    AlreadyRunning,
    Finished(Vec<RunReport>),
}

/// Drives one notification pass per reminder kind: query, filter through the
/// dedup cache, compose, send, audit, mark, pace.
pub struct Coordinator {
    candidates: Arc<dyn CandidateSource>,
    audit: Arc<dyn AuditStore>,
    gateway: Arc<dyn Gateway>,
    cache: Arc<DedupCache>,
    clock: Arc<dyn Clock>,
    composer: Composer,
    pacing: Duration,
    display_offset: FixedOffset,
    in_flight: Mutex<()>,
}

impl Coordinator {
    pub fn new(
        candidates: Arc<dyn CandidateSource>,
        audit: Arc<dyn AuditStore>,
        gateway: Arc<dyn Gateway>,
        cache: Arc<DedupCache>,
        clock: Arc<dyn Clock>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            candidates,
            audit,
            gateway,
            cache,
            clock,
            composer: Composer::new(settings.display_offset, settings.app_url),
            pacing: settings.pacing,
            display_offset: settings.display_offset,
            in_flight: Mutex::new(()),
        }
    }

    /// Runs every kind in order. Returns `AlreadyRunning` without touching
    /// any collaborator when another cycle holds the guard.
    pub async fn run_cycle(&self, kinds: &[ReminderKind], cancel: &CancellationToken) -> CycleOutcome {
        let Ok(_guard) = self.in_flight.try_lock() else {
            tracing::warn!("notification run already in progress, skipping this trigger");
            return CycleOutcome::AlreadyRunning;
        };

        tracing::info!(kinds = kinds.len(), "running notification job");
        let mut reports = Vec::with_capacity(kinds.len());
        for &kind in kinds {
            if cancel.is_cancelled() {
                break;
            }
            let report = self.run_kind(kind, cancel).await;
            report.log();
            reports.push(report);
        }
        let cache_entries = self.cache.len().await;
        tracing::info!(cache_entries, "notification job completed");

        CycleOutcome::Finished(reports)
    }

    pub async fn run(&self, kind: ReminderKind, cancel: &CancellationToken) -> Option<RunReport> {
        match self.run_cycle(&[kind], cancel).await {
            CycleOutcome::Finished(mut reports) => reports.pop(),
            CycleOutcome::AlreadyRunning => None,
        }
    }

    async fn run_kind(&self, kind: ReminderKind, cancel: &CancellationToken) -> RunReport {
        let mut report = RunReport::new(kind);
        let window = window_for(kind, self.clock.now(), self.display_offset);

        let candidates = match self.candidates.pending_candidates(kind, &window).await {
            Ok(candidates) => candidates,
            Err(err) => {
                tracing::error!(%kind, "error querying tasks to notify: {err}");
                report.status = RunStatus::QueryFailed;
                return report;
            }
        };
        report.candidates = candidates.len();
        tracing::info!(
            %kind,
            window_start = %window.start,
            window_end = %window.end,
            "found {} students to notify",
            candidates.len()
        );

        for candidate in &candidates {
            if cancel.is_cancelled() {
                report.status = RunStatus::Cancelled;
                break;
            }

            if candidate.has_submitted {
                tracing::debug!(%kind, task_id = candidate.task_id, student_id = candidate.student_id, "skipping, already submitted");
                report.skipped_submitted += 1;
                continue;
            }

            if !window.contains(candidate.deadline) {
                tracing::warn!(
                    %kind,
                    task_id = candidate.task_id,
                    deadline = %candidate.deadline,
                    "candidate deadline outside query window"
                );
            }

            let key = CacheKey::for_candidate(candidate, kind);
            if self.cache.is_recently_sent(&key).await {
                tracing::info!(%kind, student_id = candidate.student_id, "skipping {key} (recently sent)");
                report.skipped_recent += 1;
                continue;
            }

            if report.attempted() > 0 {
                tokio::select! {
                    _ = self.clock.sleep(self.pacing) => {}
                    _ = cancel.cancelled() => {
                        report.status = RunStatus::Cancelled;
                        break;
                    }
                }
            }

            self.dispatch(candidate, kind, key, &mut report).await;
        }

        report
    }

    async fn dispatch(
        &self,
        candidate: &NotificationCandidate,
        kind: ReminderKind,
        key: CacheKey,
        report: &mut RunReport,
    ) {
        tracing::debug!(
            %kind,
            task_id = candidate.task_id,
            student_id = candidate.student_id,
            max_score = candidate.max_score,
            "sending reminder"
        );
        let message = self.composer.render(candidate, kind, self.clock.now());
        let outcome = self.gateway.send(&candidate.phone, &message).await;
        let status = if outcome.delivered {
            DeliveryStatus::Delivered
        } else {
            DeliveryStatus::Failed
        };

        let record = AuditRecord {
            task_id: candidate.task_id,
            student_id: candidate.student_id,
            kind,
            sent_at: self.clock.now(),
            status,
            raw_response: outcome.raw_response,
        };
        if let Err(err) = self.audit.record(&record).await {
            tracing::error!(
                %kind,
                task_id = candidate.task_id,
                student_id = candidate.student_id,
                status = status.as_str(),
                "error saving notification record: {err}"
            );
            report.audit_failures += 1;
        }

        // Failed sends are marked too; retry waits for the cooldown.
        self.cache.mark_sent(key).await;

        match status {
            DeliveryStatus::Delivered => report.delivered += 1,
            DeliveryStatus::Failed => {
                tracing::warn!(%kind, task_id = candidate.task_id, student_id = candidate.student_id, "reminder not delivered");
                report.failed += 1;
            }
        }
    }
}
