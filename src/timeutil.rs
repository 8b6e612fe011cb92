//! Fixed-precision RFC 3339 timestamp helpers.
//!
//! All persisted timestamps use UTC with exactly six fractional digits and
//! a `Z` suffix, so lexicographic comparison in SQL equals chronological
//! comparison. Every repo goes through these helpers; raw `to_rfc3339`
//! calls are not used for stored values.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::{AppError, Result};

/// Format a timestamp for storage.
#[must_use]
pub fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current instant, formatted for storage.
#[must_use]
pub fn now_ts() -> String {
    fmt_ts(Utc::now())
}

/// Parse a stored timestamp back into a `DateTime<Utc>`.
///
/// # Errors
///
/// Returns `AppError::Db` if the value is not valid RFC 3339. Stored rows
/// are always written through [`fmt_ts`], so a parse failure indicates a
/// corrupted row.
pub fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Db(format!("invalid timestamp {raw:?}: {e}")))
}
