use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::coordinator::{RunReport, RunStatus};
use crate::models::NotificationStat;

pub fn build_stats_report(since: DateTime<Utc>, stats: &[NotificationStat]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Deadline Reminder Stats");
    let _ = writeln!(output, "Notifications sent since {}", since.format("%Y-%m-%d %H:%M UTC"));
    let _ = writeln!(output);

    if stats.is_empty() {
        let _ = writeln!(output, "No notifications recorded for this window.");
        return output;
    }

    let mut by_kind: BTreeMap<&str, (i64, i64)> = BTreeMap::new();
    for stat in stats {
        let entry = by_kind.entry(stat.kind.as_str()).or_insert((0, 0));
        match stat.status.as_str() {
            "delivered" => entry.0 += stat.total,
            _ => entry.1 += stat.total,
        }
    }

    let _ = writeln!(output, "## By Kind");
    for (kind, (delivered, failed)) in by_kind.iter() {
        let total = delivered + failed;
        let rate = if total == 0 {
            0.0
        } else {
            *delivered as f64 / total as f64 * 100.0
        };
        let _ = writeln!(
            output,
            "- {}: {} delivered, {} failed ({:.1}% delivered)",
            kind, delivered, failed, rate
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Last Activity");
    for stat in stats {
        let last = stat
            .last_sent_at
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());
        let _ = writeln!(output, "- {} / {}: {}", stat.kind, stat.status, last);
    }

    output
}

pub fn describe_run(report: &RunReport) -> String {
    let status = match report.status {
        RunStatus::Completed => "completed",
        RunStatus::QueryFailed => "query failed",
        RunStatus::Cancelled => "cancelled",
    };
    format!(
        "{} run {}: {} candidates, {} delivered, {} failed, {} skipped (recently sent), \
         {} skipped (submitted), {} audit write failures",
        report.kind,
        status,
        report.candidates,
        report.delivered,
        report.failed,
        report.skipped_recent,
        report.skipped_submitted,
        report.audit_failures
    )
}
