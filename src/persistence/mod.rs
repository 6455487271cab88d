//! Persistence layer modules.

pub mod assignment_repo;
pub mod db;
pub mod notification_repo;
pub mod request_repo;
pub mod schema;

use chrono::{DateTime, Utc};

use crate::{AppError, Result};

/// Re-export the database pool type for convenience.
pub use sqlx::SqlitePool;

/// Parse an RFC 3339 column into a UTC timestamp.
pub(crate) fn parse_ts(raw: &str, column: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Db(format!("invalid {column}: {e}")))
}

/// Parse a nullable RFC 3339 column.
pub(crate) fn parse_opt_ts(raw: Option<&str>, column: &str) -> Result<Option<DateTime<Utc>>> {
    raw.map(|s| parse_ts(s, column)).transpose()
}

/// Map lock contention to `Conflict` so callers can reload and retry.
pub(crate) fn classify(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        // SQLITE_BUSY (5) and SQLITE_BUSY_SNAPSHOT (517).
        if matches!(db_err.code().as_deref(), Some("5" | "517")) {
            return AppError::Conflict(db_err.message().to_owned());
        }
    }
    AppError::from(err)
}
