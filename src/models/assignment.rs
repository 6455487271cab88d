//! ICT officer task assignment model and lifecycle helpers.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppError, Result};

/// Lifecycle status for an implementation task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    /// Officer assigned, work not started.
    Assigned,
    /// Officer is implementing the access.
    InProgress,
    /// Implementation finished.
    Completed,
    /// Assignment withdrawn.
    Cancelled,
}

impl AssignmentStatus {
    /// Stable snake-case identifier used in storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether the assignment still blocks a new one for the same request.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Assigned | Self::InProgress)
    }
}

impl Display for AssignmentStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssignmentStatus {
    type Err = AppError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "assigned" => Ok(Self::Assigned),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(AppError::Db(format!("invalid assignment status: {other}"))),
        }
    }
}

/// Links an approved request to the ICT officer implementing it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskAssignment {
    /// Unique record identifier.
    pub id: String,
    /// Request being implemented.
    pub request_id: String,
    /// Assigned officer display name.
    pub officer_name: String,
    /// Assigned officer PF number.
    pub officer_pf_number: Option<String>,
    /// Name of the actor who made the assignment.
    pub assigned_by: String,
    /// Current lifecycle status.
    pub status: AssignmentStatus,
    /// Completion notes.
    pub notes: Option<String>,
    /// Cancellation reason.
    pub cancel_reason: Option<String>,
    /// Assignment timestamp.
    pub assigned_at: DateTime<Utc>,
    /// Timestamp the officer started work.
    pub started_at: Option<DateTime<Utc>>,
    /// Timestamp of completion or cancellation.
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskAssignment {
    /// Construct a new assignment in the `Assigned` state.
    #[must_use]
    pub fn new(
        request_id: String,
        officer_name: String,
        officer_pf_number: Option<String>,
        assigned_by: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            request_id,
            officer_name,
            officer_pf_number,
            assigned_by,
            status: AssignmentStatus::Assigned,
            notes: None,
            cancel_reason: None,
            assigned_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Determine whether a lifecycle transition is permitted.
    #[must_use]
    pub fn can_transition_to(&self, next: AssignmentStatus) -> bool {
        matches!(
            (self.status, next),
            (
                AssignmentStatus::Assigned,
                AssignmentStatus::InProgress | AssignmentStatus::Cancelled
            ) | (
                AssignmentStatus::InProgress,
                AssignmentStatus::Completed | AssignmentStatus::Cancelled
            )
        )
    }

    /// Move to `InProgress`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidTransition` unless currently `Assigned`.
    pub fn start(&mut self) -> Result<()> {
        self.transition(AssignmentStatus::InProgress)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Move to `Completed`, recording implementation notes.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidTransition` unless currently `InProgress`.
    pub fn complete(&mut self, notes: Option<String>) -> Result<()> {
        self.transition(AssignmentStatus::Completed)?;
        self.notes = notes;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Move to `Cancelled`, recording the reason.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidTransition` if already completed or cancelled.
    pub fn cancel(&mut self, reason: Option<String>) -> Result<()> {
        self.transition(AssignmentStatus::Cancelled)?;
        self.cancel_reason = reason;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    fn transition(&mut self, next: AssignmentStatus) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(AppError::InvalidTransition(format!(
                "assignment {} cannot move from {} to {next}",
                self.id, self.status
            )));
        }
        self.status = next;
        Ok(())
    }
}
