//! Task assignment repository for `SQLite` persistence.

use std::sync::Arc;

use sqlx::SqliteConnection;

use crate::models::assignment::{AssignmentStatus, TaskAssignment};
use crate::{AppError, Result};

use super::db::Database;
use super::{classify, parse_opt_ts, parse_ts};

/// Repository for ICT officer task assignments.
#[derive(Clone)]
pub struct AssignmentRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct AssignmentRow {
    id: String,
    request_id: String,
    officer_name: String,
    officer_pf_number: Option<String>,
    assigned_by: String,
    status: String,
    notes: Option<String>,
    cancel_reason: Option<String>,
    assigned_at: String,
    started_at: Option<String>,
    finished_at: Option<String>,
}

impl AssignmentRow {
    fn into_assignment(self) -> Result<TaskAssignment> {
        Ok(TaskAssignment {
            status: self.status.parse()?,
            assigned_at: parse_ts(&self.assigned_at, "assigned_at")?,
            started_at: parse_opt_ts(self.started_at.as_deref(), "started_at")?,
            finished_at: parse_opt_ts(self.finished_at.as_deref(), "finished_at")?,
            id: self.id,
            request_id: self.request_id,
            officer_name: self.officer_name,
            officer_pf_number: self.officer_pf_number,
            assigned_by: self.assigned_by,
            notes: self.notes,
            cancel_reason: self.cancel_reason,
        })
    }
}

/// Insert `task` on an open connection or transaction.
///
/// The partial unique index on active assignments backs up the in-memory
/// check when two assigners race.
pub(super) async fn insert_task(conn: &mut SqliteConnection, task: &TaskAssignment) -> Result<()> {
    let outcome = sqlx::query(
        "INSERT INTO task_assignment (id, request_id, officer_name, officer_pf_number,
         assigned_by, status, notes, cancel_reason, assigned_at, started_at, finished_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )
    .bind(&task.id)
    .bind(&task.request_id)
    .bind(&task.officer_name)
    .bind(&task.officer_pf_number)
    .bind(&task.assigned_by)
    .bind(task.status.as_str())
    .bind(&task.notes)
    .bind(&task.cancel_reason)
    .bind(task.assigned_at.to_rfc3339())
    .bind(task.started_at.map(|dt| dt.to_rfc3339()))
    .bind(task.finished_at.map(|dt| dt.to_rfc3339()))
    .execute(&mut *conn)
    .await;

    match outcome {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            Err(AppError::AlreadyAssigned(format!(
                "request {} already has an active assignment",
                task.request_id
            )))
        }
        Err(err) => Err(classify(err)),
    }
}

pub(super) async fn fetch_for_request(
    conn: &mut SqliteConnection,
    request_id: &str,
) -> Result<Vec<TaskAssignment>> {
    let rows: Vec<AssignmentRow> = sqlx::query_as(
        "SELECT * FROM task_assignment WHERE request_id = ?1 ORDER BY assigned_at ASC",
    )
    .bind(request_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(classify)?;

    rows.into_iter().map(AssignmentRow::into_assignment).collect()
}

/// Write lifecycle columns, guarded by the status the caller loaded.
pub(super) async fn write_lifecycle(
    conn: &mut SqliteConnection,
    task: &TaskAssignment,
    previous: AssignmentStatus,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE task_assignment SET status = ?1, notes = ?2, cancel_reason = ?3,
         started_at = ?4, finished_at = ?5
         WHERE id = ?6 AND status = ?7",
    )
    .bind(task.status.as_str())
    .bind(&task.notes)
    .bind(&task.cancel_reason)
    .bind(task.started_at.map(|dt| dt.to_rfc3339()))
    .bind(task.finished_at.map(|dt| dt.to_rfc3339()))
    .bind(&task.id)
    .bind(previous.as_str())
    .execute(&mut *conn)
    .await
    .map_err(classify)?;

    if result.rows_affected() == 0 {
        return Err(AppError::Conflict(format!(
            "assignment {} is no longer {previous}",
            task.id
        )));
    }
    Ok(())
}

impl AssignmentRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Retrieve an assignment by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<TaskAssignment>> {
        let row: Option<AssignmentRow> =
            sqlx::query_as("SELECT * FROM task_assignment WHERE id = ?1")
                .bind(id)
                .fetch_optional(self.db.as_ref())
                .await
                .map_err(classify)?;

        row.map(AssignmentRow::into_assignment).transpose()
    }

    /// List every assignment for a request, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_for_request(&self, request_id: &str) -> Result<Vec<TaskAssignment>> {
        let mut conn = self.db.acquire().await.map_err(classify)?;
        fetch_for_request(&mut conn, request_id).await
    }

    /// Persist a lifecycle change made in memory.
    ///
    /// `previous` is the status the caller loaded; the update only applies
    /// if the row still holds it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Conflict` if the row changed since it was loaded.
    pub async fn update_lifecycle(
        &self,
        task: &TaskAssignment,
        previous: AssignmentStatus,
    ) -> Result<()> {
        let mut conn = self.db.acquire().await.map_err(classify)?;
        write_lifecycle(&mut conn, task, previous).await
    }
}
