use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::KindError;

/// One (task, student) pair that still owes a submission.
#[derive(Debug, Clone)]
pub struct NotificationCandidate {
    pub task_id: i64,
    pub task_title: String,
    pub deadline: DateTime<Utc>,
    pub max_score: i32,
    pub subject_name: String,
    pub class_name: String,
    pub student_id: i64,
    pub student_name: String,
    pub phone: String,
    pub has_submitted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReminderKind {
    ThreeDaysBefore,
    OneDayBefore,
    TwoHoursBefore,
    Overdue,
}

impl ReminderKind {
    pub const ALL: [ReminderKind; 4] = [
        ReminderKind::ThreeDaysBefore,
        ReminderKind::OneDayBefore,
        ReminderKind::TwoHoursBefore,
        ReminderKind::Overdue,
    ];

    /// Code stored in `task_notifications.kind`.
    pub fn code(self) -> &'static str {
        match self {
            ReminderKind::ThreeDaysBefore => "3_hari",
            ReminderKind::OneDayBefore => "1_hari",
            ReminderKind::TwoHoursBefore => "2_jam",
            ReminderKind::Overdue => "lewat_deadline",
        }
    }

    /// Phrase appended to the deadline in reminder messages.
    pub fn lead_in(self) -> Option<&'static str> {
        match self {
            ReminderKind::ThreeDaysBefore => Some("3 hari lagi"),
            ReminderKind::OneDayBefore => Some("besok"),
            ReminderKind::TwoHoursBefore => Some("2 jam lagi"),
            ReminderKind::Overdue => None,
        }
    }
}

impl fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ReminderKind {
    type Err = KindError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        ReminderKind::ALL
            .into_iter()
            .find(|kind| kind.code() == trimmed)
            .ok_or_else(|| KindError(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Failed => "failed",
        }
    }
}

/// Outcome of one dispatch attempt, written once and never updated.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub task_id: i64,
    pub student_id: i64,
    pub kind: ReminderKind,
    pub sent_at: DateTime<Utc>,
    pub status: DeliveryStatus,
    pub raw_response: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub task_id: i64,
    pub student_id: i64,
    pub kind: ReminderKind,
}

impl CacheKey {
    pub fn for_candidate(candidate: &NotificationCandidate, kind: ReminderKind) -> Self {
        Self {
            task_id: candidate.task_id,
            student_id: candidate.student_id,
            kind,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.task_id, self.student_id, self.kind)
    }
}

/// Aggregated audit rows for one (kind, status) pair.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationStat {
    pub kind: String,
    pub status: String,
    pub total: i64,
    pub last_sent_at: Option<DateTime<Utc>>,
}
