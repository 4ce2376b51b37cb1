//! Test doubles for the dispatch collaborators.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Notify;

use crate::clock::Clock;
use crate::coordinator::{AuditStore, CandidateSource};
use crate::error::StoreError;
use crate::gateway::{Gateway, SendOutcome};
use crate::models::{AuditRecord, NotificationCandidate, ReminderKind};
use crate::window::TimeWindow;

/// Clock that only moves when told to; `sleep` advances it instantly,
/// or never returns when the clock is stalled.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    sleeps: Mutex<Vec<Duration>>,
    stalled: bool,
    slept: Notify,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
            sleeps: Mutex::new(Vec::new()),
            stalled: false,
            slept: Notify::new(),
        }
    }

    pub fn stalled() -> Self {
        Self {
            stalled: true,
            ..Self::default()
        }
    }

    pub async fn wait_for_sleep(&self) {
        self.slept.notified().await;
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.now.lock().unwrap() += by;
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at(Utc.with_ymd_and_hms(2026, 3, 10, 2, 0, 0).unwrap())
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        self.slept.notify_one();
        if self.stalled {
            std::future::pending::<()>().await;
        }
        self.advance(chrono::Duration::from_std(duration).unwrap());
    }
}

#[derive(Default)]
pub struct FakeCandidates {
    candidates: Vec<NotificationCandidate>,
    fail: bool,
    queries: Mutex<Vec<(ReminderKind, TimeWindow)>>,
    queried: Notify,
}

impl FakeCandidates {
    pub fn returning(candidates: Vec<NotificationCandidate>) -> Self {
        Self {
            candidates,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn queries(&self) -> Vec<(ReminderKind, TimeWindow)> {
        self.queries.lock().unwrap().clone()
    }

    pub async fn wait_for_query(&self) {
        self.queried.notified().await;
    }
}

#[async_trait]
impl CandidateSource for FakeCandidates {
    async fn pending_candidates(
        &self,
        kind: ReminderKind,
        window: &TimeWindow,
    ) -> Result<Vec<NotificationCandidate>, StoreError> {
        self.queries.lock().unwrap().push((kind, *window));
        self.queried.notify_one();
        if self.fail {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(self.candidates.clone())
    }
}

#[derive(Default)]
pub struct RecordingAudit {
    records: Mutex<Vec<AuditRecord>>,
    fail: bool,
}

impl RecordingAudit {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditStore for RecordingAudit {
    async fn record(&self, record: &AuditRecord) -> Result<(), StoreError> {
        if self.fail {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Gateway that succeeds except on the listed (zero-based) call numbers.
/// With `hold`, every send parks until the hold is notified.
#[derive(Default)]
pub struct ScriptedGateway {
    failing_calls: HashSet<usize>,
    calls: Mutex<Vec<(String, String)>>,
    entered: Notify,
    hold: Option<Arc<Notify>>,
}

impl ScriptedGateway {
    pub fn failing_on(calls: impl IntoIterator<Item = usize>) -> Self {
        Self {
            failing_calls: calls.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn held_by(hold: Arc<Notify>) -> Self {
        Self {
            hold: Some(hold),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub async fn wait_until_entered(&self) {
        self.entered.notified().await;
    }
}

#[async_trait]
impl Gateway for ScriptedGateway {
    async fn send(&self, phone: &str, message: &str) -> SendOutcome {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((phone.to_string(), message.to_string()));
            calls.len() - 1
        };
        self.entered.notify_one();
        if let Some(hold) = &self.hold {
            hold.notified().await;
        }

        if self.failing_calls.contains(&index) {
            SendOutcome {
                delivered: false,
                raw_response: Some(r#"{"status":false,"reason":"device offline"}"#.to_string()),
            }
        } else {
            SendOutcome {
                delivered: true,
                raw_response: Some(r#"{"status":true}"#.to_string()),
            }
        }
    }
}

pub fn candidate(task_id: i64, student_id: i64, deadline: DateTime<Utc>) -> NotificationCandidate {
    NotificationCandidate {
        task_id,
        task_title: format!("Tugas {task_id}"),
        deadline,
        max_score: 100,
        subject_name: "Matematika".to_string(),
        class_name: "X IPA 1".to_string(),
        student_id,
        student_name: format!("Siswa {student_id}"),
        phone: format!("08123456{student_id:04}"),
        has_submitted: false,
    }
}
