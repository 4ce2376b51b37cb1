use thiserror::Error;

/// Failure reported by the candidate query or the audit writer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PhoneError {
    #[error("phone number '{raw}' has only {digits} digits (need at least 10)")]
    TooShort { raw: String, digits: usize },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("cron expression '{0}' needs 5 fields: MIN HOUR DOM MON DOW")]
    FieldCount(String),
    #[error("invalid {field} field '{value}' in cron expression")]
    Field { field: &'static str, value: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown reminder kind '{0}' (expected 3_hari, 1_hari, 2_jam or lewat_deadline)")]
pub struct KindError(pub String);
