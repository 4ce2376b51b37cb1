//! Minimal cron expression support for the reminder schedule.
//! Format: "MIN HOUR DOM MON DOW", evaluated in UTC.
//! Minute and hour accept `*`, `*/N`, `N` and `a,b,c`; the date fields only `*`.

use chrono::{DateTime, Duration, Timelike, Utc};

use crate::error::ScheduleError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expression: String,
    minutes: Vec<u32>,
    hours: Vec<u32>,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self, ScheduleError> {
        let parts: Vec<&str> = expression.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(ScheduleError::FieldCount(expression.to_string()));
        }

        let minutes = parse_field("minute", parts[0], 0, 59)?;
        let hours = parse_field("hour", parts[1], 0, 23)?;
        for (field, value) in [
            ("day-of-month", parts[2]),
            ("month", parts[3]),
            ("day-of-week", parts[4]),
        ] {
            if value != "*" {
                return Err(ScheduleError::Field {
                    field,
                    value: value.to_string(),
                });
            }
        }

        Ok(Self {
            expression: expression.to_string(),
            minutes,
            hours,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First matching minute strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut candidate = after + Duration::minutes(1);
        candidate = candidate.with_second(0)?.with_nanosecond(0)?;

        // Every field but minute/hour is `*`, so a match is always within a day.
        for _ in 0..(24 * 60) {
            if self.minutes.contains(&candidate.minute()) && self.hours.contains(&candidate.hour()) {
                return Some(candidate);
            }
            candidate += Duration::minutes(1);
        }

        None
    }
}

fn parse_field(field: &'static str, spec: &str, min: u32, max: u32) -> Result<Vec<u32>, ScheduleError> {
    let invalid = || ScheduleError::Field {
        field,
        value: spec.to_string(),
    };

    if spec == "*" {
        return Ok((min..=max).collect());
    }

    if let Some(step) = spec.strip_prefix("*/") {
        let n: usize = step.parse().map_err(|_| invalid())?;
        if n == 0 {
            return Err(invalid());
        }
        return Ok((min..=max).step_by(n).collect());
    }

    let mut values = Vec::new();
    for part in spec.split(',') {
        let n: u32 = part.trim().parse().map_err(|_| invalid())?;
        if n < min || n > max {
            return Err(invalid());
        }
        values.push(n);
    }
    Ok(values)
}
