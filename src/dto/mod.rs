use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub mod features;
pub mod game;
pub mod health;
pub mod validation;

/// Render Unix milliseconds as an RFC 3339 timestamp.
fn format_millis(millis: i64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .ok()
        .and_then(|time| time.format(&Rfc3339).ok())
        .unwrap_or_else(|| "invalid-timestamp".into())
}
