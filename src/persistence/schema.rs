//! `SQLite` schema bootstrap logic.
//!
//! All definitions use `IF NOT EXISTS`, so this runs on every startup.

use sqlx::SqlitePool;

use crate::Result;

/// Apply all table and index definitions to the connected database.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS access_request (
    id                  TEXT PRIMARY KEY NOT NULL,
    pf_number           TEXT NOT NULL,
    staff_name          TEXT NOT NULL,
    phone               TEXT NOT NULL,
    department          TEXT NOT NULL,
    subject             TEXT NOT NULL,
    access_type         TEXT NOT NULL,
    resubmission_count  INTEGER NOT NULL DEFAULT 0,
    last_resubmitted_at TEXT,
    last_resubmitted_by TEXT,
    cancelled_by        TEXT,
    cancel_reason       TEXT,
    cancelled_at        TEXT,
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL,
    version             INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS stage_record (
    request_id      TEXT NOT NULL REFERENCES access_request(id) ON DELETE CASCADE,
    position        INTEGER NOT NULL CHECK(position BETWEEN 0 AND 4),
    stage           TEXT NOT NULL CHECK(stage IN ('hod','divisional_director','ict_director','head_of_it','ict_officer')),
    status          TEXT NOT NULL CHECK(status IN ('pending','approved','rejected')),
    approver_name   TEXT,
    comments        TEXT,
    signature_ref   TEXT,
    decided_at      TEXT,
    PRIMARY KEY (request_id, stage)
);

CREATE TABLE IF NOT EXISTS task_assignment (
    id                  TEXT PRIMARY KEY NOT NULL,
    request_id          TEXT NOT NULL REFERENCES access_request(id) ON DELETE CASCADE,
    officer_name        TEXT NOT NULL,
    officer_pf_number   TEXT,
    assigned_by         TEXT NOT NULL,
    status              TEXT NOT NULL CHECK(status IN ('assigned','in_progress','completed','cancelled')),
    notes               TEXT,
    cancel_reason       TEXT,
    assigned_at         TEXT NOT NULL,
    started_at          TEXT,
    finished_at         TEXT
);

CREATE TABLE IF NOT EXISTS notification (
    id              TEXT PRIMARY KEY NOT NULL,
    request_id      TEXT NOT NULL,
    event           TEXT NOT NULL,
    status          TEXT NOT NULL CHECK(status IN ('pending','sent','failed')),
    attempts        INTEGER NOT NULL DEFAULT 0,
    last_error      TEXT,
    created_at      TEXT NOT NULL,
    delivered_at    TEXT
);

CREATE INDEX IF NOT EXISTS idx_request_pf ON access_request(pf_number);
CREATE INDEX IF NOT EXISTS idx_stage_request ON stage_record(request_id, position);
CREATE INDEX IF NOT EXISTS idx_assignment_request ON task_assignment(request_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_assignment_active
    ON task_assignment(request_id) WHERE status IN ('assigned','in_progress');
CREATE INDEX IF NOT EXISTS idx_notification_status ON notification(status);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
