use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Utc};

use crate::models::ReminderKind;

/// Half-open deadline range `[start, end)` a run looks at, plus the point
/// after which an earlier audit record of the same kind excludes a pair.
/// `notified_since == None` means any earlier record excludes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub notified_since: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

pub fn window_for(kind: ReminderKind, now: DateTime<Utc>, offset: FixedOffset) -> TimeWindow {
    match kind {
        ReminderKind::ThreeDaysBefore => local_day(now + Duration::days(3), offset),
        ReminderKind::OneDayBefore => local_day(now + Duration::days(1), offset),
        ReminderKind::TwoHoursBefore => TimeWindow {
            start: now + Duration::minutes(90),
            end: now + Duration::minutes(150),
            notified_since: None,
        },
        ReminderKind::Overdue => TimeWindow {
            start: now - Duration::days(7),
            end: now,
            notified_since: Some(start_of_local_day(now, offset)),
        },
    }
}

/// Midnight (in the display timezone) of the day containing `instant`.
pub fn start_of_local_day(instant: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
    let local_midnight = instant
        .with_timezone(&offset)
        .date_naive()
        .and_time(NaiveTime::MIN);
    local_midnight.and_utc() - Duration::seconds(i64::from(offset.local_minus_utc()))
}

fn local_day(target: DateTime<Utc>, offset: FixedOffset) -> TimeWindow {
    let start = start_of_local_day(target, offset);
    TimeWindow {
        start,
        end: start + Duration::days(1),
        notified_since: None,
    }
}
