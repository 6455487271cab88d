//! Access request repository for `SQLite` persistence.
//!
//! A request and its five stage rows are always read and written together.
//! Writes check the `version` column so a writer holding stale state fails
//! with `AppError::Conflict` instead of overwriting a newer decision.

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::SqliteConnection;

use crate::models::assignment::{AssignmentStatus, TaskAssignment};
use crate::models::request::{AccessRequest, Cancellation};
use crate::models::stage::{StageName, StageRecord, StageSignoff, StageState};
use crate::{AppError, Result};

use super::assignment_repo;
use super::db::Database;
use super::{classify, parse_opt_ts, parse_ts};

/// Repository wrapper around `SQLite` for access request records.
#[derive(Clone)]
pub struct RequestRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct RequestRow {
    id: String,
    pf_number: String,
    staff_name: String,
    phone: String,
    department: String,
    subject: String,
    access_type: String,
    resubmission_count: i64,
    last_resubmitted_at: Option<String>,
    last_resubmitted_by: Option<String>,
    cancelled_by: Option<String>,
    cancel_reason: Option<String>,
    cancelled_at: Option<String>,
    created_at: String,
    updated_at: String,
    version: i64,
}

#[derive(sqlx::FromRow)]
struct StageRow {
    stage: String,
    status: String,
    approver_name: Option<String>,
    comments: Option<String>,
    signature_ref: Option<String>,
    decided_at: Option<String>,
}

impl StageRow {
    fn into_record(self) -> Result<StageRecord> {
        let stage: StageName = self
            .stage
            .parse()
            .map_err(|_| AppError::Db(format!("invalid stage: {}", self.stage)))?;
        if self.status == "pending" {
            return Ok(StageRecord::pending(stage));
        }

        let approver_name = self
            .approver_name
            .ok_or_else(|| AppError::Db(format!("decided stage {stage} has no approver")))?;
        let decided_at = parse_opt_ts(self.decided_at.as_deref(), "decided_at")?
            .ok_or_else(|| AppError::Db(format!("decided stage {stage} has no decided_at")))?;
        let signoff = StageSignoff {
            approver_name,
            comments: self.comments,
            signature_ref: self.signature_ref,
            decided_at,
        };
        let state = match self.status.as_str() {
            "approved" => StageState::Approved(signoff),
            "rejected" => StageState::Rejected(signoff),
            other => return Err(AppError::Db(format!("invalid stage status: {other}"))),
        };
        Ok(StageRecord { stage, state })
    }
}

impl RequestRow {
    /// Convert a database row plus its stage rows into the domain model.
    fn into_request(self, stages: Vec<StageRow>) -> Result<AccessRequest> {
        let stages = stages
            .into_iter()
            .map(StageRow::into_record)
            .collect::<Result<Vec<_>>>()?;
        let cancellation = match (self.cancelled_by, self.cancelled_at) {
            (Some(cancelled_by), Some(at)) => Some(Cancellation {
                cancelled_by,
                reason: self.cancel_reason,
                cancelled_at: parse_ts(&at, "cancelled_at")?,
            }),
            _ => None,
        };

        let request = AccessRequest {
            subject: serde_json::from_str(&self.subject)?,
            access_type: serde_json::from_str(&self.access_type)?,
            id: self.id,
            pf_number: self.pf_number,
            staff_name: self.staff_name,
            phone: self.phone,
            department: self.department,
            stages,
            resubmission_count: u32::try_from(self.resubmission_count)
                .map_err(|e| AppError::Db(format!("invalid resubmission_count: {e}")))?,
            last_resubmitted_at: parse_opt_ts(
                self.last_resubmitted_at.as_deref(),
                "last_resubmitted_at",
            )?,
            last_resubmitted_by: self.last_resubmitted_by,
            cancellation,
            created_at: parse_ts(&self.created_at, "created_at")?,
            updated_at: parse_ts(&self.updated_at, "updated_at")?,
            version: self.version,
        };
        request.check_stage_layout()?;
        Ok(request)
    }
}

async fn fetch_request(conn: &mut SqliteConnection, id: &str) -> Result<Option<AccessRequest>> {
    let row: Option<RequestRow> = sqlx::query_as("SELECT * FROM access_request WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(classify)?;
    let Some(row) = row else {
        return Ok(None);
    };

    let stages: Vec<StageRow> = sqlx::query_as(
        "SELECT stage, status, approver_name, comments, signature_ref, decided_at
         FROM stage_record WHERE request_id = ?1 ORDER BY position ASC",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await
    .map_err(classify)?;

    row.into_request(stages).map(Some)
}

async fn write_stages(conn: &mut SqliteConnection, request: &AccessRequest) -> Result<()> {
    for (position, record) in request.stages.iter().enumerate() {
        let position = i64::try_from(position)
            .map_err(|e| AppError::Db(format!("invalid stage position: {e}")))?;
        let signoff = record.signoff();

        sqlx::query(
            "INSERT INTO stage_record (request_id, position, stage, status, approver_name,
             comments, signature_ref, decided_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(request_id, stage) DO UPDATE SET
                position = excluded.position,
                status = excluded.status,
                approver_name = excluded.approver_name,
                comments = excluded.comments,
                signature_ref = excluded.signature_ref,
                decided_at = excluded.decided_at",
        )
        .bind(&request.id)
        .bind(position)
        .bind(record.stage.as_str())
        .bind(record.status().as_str())
        .bind(signoff.map(|s| s.approver_name.clone()))
        .bind(signoff.and_then(|s| s.comments.clone()))
        .bind(signoff.and_then(|s| s.signature_ref.clone()))
        .bind(signoff.map(|s| s.decided_at.to_rfc3339()))
        .execute(&mut *conn)
        .await
        .map_err(classify)?;
    }
    Ok(())
}

/// Claim the write lock, then read the request.
///
/// Other writers wait on `busy_timeout` instead of reading a snapshot that
/// is already stale.
async fn lock_request(conn: &mut SqliteConnection, id: &str) -> Result<AccessRequest> {
    sqlx::query("UPDATE access_request SET version = version WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(classify)?;
    fetch_request(conn, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("access request {id} not found")))
}

/// Write mutable columns and stages, guarded by the loaded version.
async fn store(conn: &mut SqliteConnection, request: &AccessRequest) -> Result<AccessRequest> {
    request.check_stage_layout()?;
    let cancellation = request.cancellation.as_ref();

    let result = sqlx::query(
        "UPDATE access_request SET
            resubmission_count = ?1,
            last_resubmitted_at = ?2,
            last_resubmitted_by = ?3,
            cancelled_by = ?4,
            cancel_reason = ?5,
            cancelled_at = ?6,
            updated_at = ?7,
            version = version + 1
         WHERE id = ?8 AND version = ?9",
    )
    .bind(i64::from(request.resubmission_count))
    .bind(request.last_resubmitted_at.map(|dt| dt.to_rfc3339()))
    .bind(&request.last_resubmitted_by)
    .bind(cancellation.map(|c| c.cancelled_by.clone()))
    .bind(cancellation.and_then(|c| c.reason.clone()))
    .bind(cancellation.map(|c| c.cancelled_at.to_rfc3339()))
    .bind(request.updated_at.to_rfc3339())
    .bind(&request.id)
    .bind(request.version)
    .execute(&mut *conn)
    .await
    .map_err(classify)?;

    if result.rows_affected() == 0 {
        return Err(AppError::Conflict(format!(
            "request {} changed since version {}",
            request.id, request.version
        )));
    }

    write_stages(conn, request).await?;

    let mut saved = request.clone();
    saved.version += 1;
    Ok(saved)
}

impl RequestRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new request together with its stage rows.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn insert(&self, request: &AccessRequest) -> Result<AccessRequest> {
        request.check_stage_layout()?;
        let subject = serde_json::to_string(&request.subject)?;
        let access_type = serde_json::to_string(&request.access_type)?;

        let mut tx = self.db.begin().await.map_err(classify)?;
        sqlx::query(
            "INSERT INTO access_request (id, pf_number, staff_name, phone, department, subject,
             access_type, resubmission_count, created_at, updated_at, version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(&request.id)
        .bind(&request.pf_number)
        .bind(&request.staff_name)
        .bind(&request.phone)
        .bind(&request.department)
        .bind(&subject)
        .bind(&access_type)
        .bind(i64::from(request.resubmission_count))
        .bind(request.created_at.to_rfc3339())
        .bind(request.updated_at.to_rfc3339())
        .bind(request.version)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;

        write_stages(&mut tx, request).await?;
        tx.commit().await.map_err(classify)?;

        Ok(request.clone())
    }

    /// Retrieve a request by identifier.
    ///
    /// Returns `Ok(None)` if the request does not exist.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails or the stored rows are malformed.
    pub async fn load(&self, id: &str) -> Result<Option<AccessRequest>> {
        let mut conn = self.db.acquire().await.map_err(classify)?;
        fetch_request(&mut conn, id).await
    }

    /// Persist a previously loaded request.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Conflict` if the stored version no longer matches
    /// `request.version`, or `AppError::Db` on write failure.
    pub async fn save(&self, request: &AccessRequest) -> Result<AccessRequest> {
        let mut tx = self.db.begin().await.map_err(classify)?;
        let saved = store(&mut tx, request).await?;
        tx.commit().await.map_err(classify)?;
        Ok(saved)
    }

    /// Load, mutate, and save a request inside one transaction.
    ///
    /// If `mutate` fails the transaction is rolled back and nothing is written.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown id, the error from
    /// `mutate`, or `AppError::Conflict` if another writer got there first.
    pub async fn update_with<T, F>(&self, id: &str, mutate: F) -> Result<(AccessRequest, T)>
    where
        F: FnOnce(&mut AccessRequest) -> Result<T>,
    {
        let mut tx = self.db.begin().await.map_err(classify)?;
        let mut request = lock_request(&mut tx, id).await?;

        let outcome = mutate(&mut request)?;

        let saved = store(&mut tx, &request).await?;
        tx.commit().await.map_err(classify)?;
        Ok((saved, outcome))
    }

    /// Like [`Self::update_with`], but `mutate` also sees the request's
    /// assignments.
    ///
    /// Assignments pushed onto the list are inserted and status changes to
    /// loaded ones are written, all in the request's transaction. Any
    /// failure rolls back the request as well.
    ///
    /// # Errors
    ///
    /// As for [`Self::update_with`], plus `AppError::AlreadyAssigned` if an
    /// inserted assignment collides with an active one.
    pub async fn update_with_tasks<T, F>(
        &self,
        id: &str,
        mutate: F,
    ) -> Result<(AccessRequest, Vec<TaskAssignment>, T)>
    where
        F: FnOnce(&mut AccessRequest, &mut Vec<TaskAssignment>) -> Result<T>,
    {
        let mut tx = self.db.begin().await.map_err(classify)?;
        let mut request = lock_request(&mut tx, id).await?;
        let mut tasks = assignment_repo::fetch_for_request(&mut tx, id).await?;
        let loaded: HashMap<String, AssignmentStatus> = tasks
            .iter()
            .map(|task| (task.id.clone(), task.status))
            .collect();

        let outcome = mutate(&mut request, &mut tasks)?;

        let saved = store(&mut tx, &request).await?;
        for task in &tasks {
            match loaded.get(&task.id) {
                None => assignment_repo::insert_task(&mut tx, task).await?,
                Some(&previous) if previous != task.status => {
                    assignment_repo::write_lifecycle(&mut tx, task, previous).await?;
                }
                Some(_) => {}
            }
        }
        tx.commit().await.map_err(classify)?;
        Ok((saved, tasks, outcome))
    }

    /// List requests that have not been cancelled, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_open(&self) -> Result<Vec<AccessRequest>> {
        self.list_where("cancelled_at IS NULL", None).await
    }

    /// List every request raised by the staff member with `pf_number`.
    ///
    /// PF numbers compare case-insensitively, matching identity lookup.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_by_pf_number(&self, pf_number: &str) -> Result<Vec<AccessRequest>> {
        self.list_where("pf_number = ?1 COLLATE NOCASE", Some(pf_number.trim())).await
    }

    async fn list_where(&self, filter: &str, arg: Option<&str>) -> Result<Vec<AccessRequest>> {
        let mut conn = self.db.acquire().await.map_err(classify)?;
        // `filter` is always one of the literals above, never caller input.
        let sql = format!("SELECT id FROM access_request WHERE {filter} ORDER BY created_at ASC");
        let mut query = sqlx::query_scalar::<_, String>(&sql);
        if let Some(arg) = arg {
            query = query.bind(arg.to_owned());
        }
        let ids = query.fetch_all(&mut *conn).await.map_err(classify)?;

        let mut requests = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(request) = fetch_request(&mut conn, &id).await? {
                requests.push(request);
            }
        }
        Ok(requests)
    }
}
