//! Notification delivery record repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::Utc;

use crate::models::notification::{DeliveryStatus, NotificationRecord};
use crate::{AppError, Result};

use super::db::Database;
use super::{classify, parse_opt_ts, parse_ts};

/// Repository for notification delivery records.
#[derive(Clone)]
pub struct NotificationRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: String,
    event: String,
    status: String,
    attempts: i64,
    last_error: Option<String>,
    created_at: String,
    delivered_at: Option<String>,
}

impl NotificationRow {
    fn into_record(self) -> Result<NotificationRecord> {
        Ok(NotificationRecord {
            event: serde_json::from_str(&self.event)?,
            status: self.status.parse()?,
            attempts: u32::try_from(self.attempts)
                .map_err(|e| AppError::Db(format!("invalid attempts: {e}")))?,
            created_at: parse_ts(&self.created_at, "created_at")?,
            delivered_at: parse_opt_ts(self.delivered_at.as_deref(), "delivered_at")?,
            id: self.id,
            last_error: self.last_error,
        })
    }
}

impl NotificationRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new delivery record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn insert(&self, record: &NotificationRecord) -> Result<NotificationRecord> {
        let event = serde_json::to_string(&record.event)?;

        sqlx::query(
            "INSERT INTO notification (id, request_id, event, status, attempts, last_error,
             created_at, delivered_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&record.id)
        .bind(&record.event.request_id)
        .bind(&event)
        .bind(record.status.as_str())
        .bind(i64::from(record.attempts))
        .bind(&record.last_error)
        .bind(record.created_at.to_rfc3339())
        .bind(record.delivered_at.map(|dt| dt.to_rfc3339()))
        .execute(self.db.as_ref())
        .await
        .map_err(classify)?;

        Ok(record.clone())
    }

    /// Retrieve a delivery record by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<NotificationRecord>> {
        let row: Option<NotificationRow> =
            sqlx::query_as("SELECT * FROM notification WHERE id = ?1")
                .bind(id)
                .fetch_optional(self.db.as_ref())
                .await
                .map_err(classify)?;

        row.map(NotificationRow::into_record).transpose()
    }

    /// List delivery records for a request, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_for_request(&self, request_id: &str) -> Result<Vec<NotificationRecord>> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            "SELECT * FROM notification WHERE request_id = ?1 ORDER BY created_at ASC",
        )
        .bind(request_id)
        .fetch_all(self.db.as_ref())
        .await
        .map_err(classify)?;

        rows.into_iter().map(NotificationRow::into_record).collect()
    }

    /// List records that are not yet sent, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_undelivered(&self) -> Result<Vec<NotificationRecord>> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            "SELECT * FROM notification WHERE status IN ('pending','failed')
             ORDER BY created_at ASC",
        )
        .fetch_all(self.db.as_ref())
        .await
        .map_err(classify)?;

        rows.into_iter().map(NotificationRow::into_record).collect()
    }

    /// Record the outcome of one delivery attempt.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn record_attempt(
        &self,
        id: &str,
        status: DeliveryStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let delivered_at = (status == DeliveryStatus::Sent).then(|| Utc::now().to_rfc3339());

        sqlx::query(
            "UPDATE notification SET status = ?1, attempts = attempts + 1,
             last_error = ?2, delivered_at = COALESCE(?3, delivered_at)
             WHERE id = ?4",
        )
        .bind(status.as_str())
        .bind(error)
        .bind(delivered_at)
        .bind(id)
        .execute(self.db.as_ref())
        .await
        .map_err(classify)?;

        Ok(())
    }
}
