use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context};
use chrono::FixedOffset;

use crate::coordinator::DispatchSettings;
use crate::cron::CronSchedule;
use crate::models::ReminderKind;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub gateway_url: String,
    pub gateway_api_key: String,
    pub cooldown: chrono::Duration,
    pub cache_horizon: chrono::Duration,
    pub pacing: Duration,
    pub schedule: CronSchedule,
    pub kinds: Vec<ReminderKind>,
    pub display_offset: FixedOffset,
    pub app_url: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL")
            .context("DATABASE_URL must be set to a production Postgres instance")?;

        let schedule_expr = lookup("REMINDER_SCHEDULE").unwrap_or_else(|| "0 * * * *".to_string());
        let schedule = CronSchedule::parse(&schedule_expr).context("invalid REMINDER_SCHEDULE")?;

        let kinds = lookup("REMINDER_KINDS")
            .unwrap_or_else(|| ReminderKind::OneDayBefore.code().to_string())
            .split(',')
            .filter(|code| !code.trim().is_empty())
            .map(ReminderKind::from_str)
            .collect::<Result<Vec<_>, _>>()
            .context("invalid REMINDER_KINDS")?;
        if kinds.is_empty() {
            return Err(anyhow!("REMINDER_KINDS must name at least one kind"));
        }

        let offset_hours: i32 = parse_or(&lookup, "REMINDER_DISPLAY_UTC_OFFSET_HOURS", 7)?;
        let display_offset = offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .with_context(|| format!("REMINDER_DISPLAY_UTC_OFFSET_HOURS out of range: {offset_hours}"))?;

        let cooldown = positive_secs(&lookup, "REMINDER_COOLDOWN_SECS", 3600)?;
        let cache_horizon = positive_secs(&lookup, "REMINDER_CACHE_HORIZON_SECS", 86_400)?;
        if cache_horizon < cooldown {
            return Err(anyhow!(
                "REMINDER_CACHE_HORIZON_SECS ({}s) must not be shorter than REMINDER_COOLDOWN_SECS ({}s)",
                cache_horizon.num_seconds(),
                cooldown.num_seconds()
            ));
        }

        Ok(Self {
            database_url,
            max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?,
            gateway_url: lookup("FONNTE_URL").unwrap_or_else(|| "https://api.fonnte.com/send".to_string()),
            gateway_api_key: lookup("FONNTE_API_KEY").unwrap_or_default(),
            cooldown,
            cache_horizon,
            pacing: Duration::from_millis(parse_or(&lookup, "REMINDER_PACING_MS", 2000)?),
            schedule,
            kinds,
            display_offset,
            app_url: lookup("REMINDER_APP_URL").unwrap_or_else(|| "http://localhost:5174".to_string()),
        })
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            pacing: self.pacing,
            display_offset: self.display_offset,
            app_url: self.app_url.clone(),
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}

fn positive_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: i64,
) -> anyhow::Result<chrono::Duration> {
    let secs: i64 = parse_or(lookup, key, default)?;
    if secs <= 0 {
        return Err(anyhow!("{key} must be a positive number of seconds, got {secs}"));
    }
    chrono::Duration::try_seconds(secs).with_context(|| format!("{key} out of range: {secs}"))
}
