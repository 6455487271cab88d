//! Structured audit trail for workflow events.
//!
//! Provides the [`AuditLogger`] trait and associated types. The primary
//! implementation, [`JsonlAuditWriter`], appends JSONL records to
//! daily-rotating files in the configured audit directory.

pub mod writer;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::actor::Actor;
use crate::models::stage::StageName;

/// Event type classification for audit log entries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// A new access request was submitted.
    RequestSubmitted,
    /// A stage was approved.
    StageApproved,
    /// A stage was rejected.
    StageRejected,
    /// A rejected stage was reopened.
    Resubmitted,
    /// The request was withdrawn.
    RequestCancelled,
    /// An ICT officer was assigned.
    TaskAssigned,
    /// The officer started work.
    TaskStarted,
    /// The officer finished work.
    TaskCompleted,
    /// The assignment was withdrawn.
    TaskCancelled,
}

/// A structured record of one workflow event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// ISO 8601 timestamp with timezone.
    pub timestamp: DateTime<Utc>,
    /// Event classification.
    pub event_type: AuditEventType,
    /// Access request identifier.
    pub request_id: Option<String>,
    /// Stage concerned, for stage events.
    pub stage: Option<StageName>,
    /// Acting user's display name.
    pub actor_name: Option<String>,
    /// Acting user's role.
    pub actor_role: Option<String>,
    /// Comment, rejection reason, or cancellation reason.
    pub reason: Option<String>,
    /// Task assignment identifier, for task events.
    pub assignment_id: Option<String>,
}

impl AuditEntry {
    /// Construct a minimal audit entry for the given event type.
    #[must_use]
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            request_id: None,
            stage: None,
            actor_name: None,
            actor_role: None,
            reason: None,
            assignment_id: None,
        }
    }

    /// Set the request identifier.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Set the stage concerned.
    #[must_use]
    pub fn with_stage(mut self, stage: StageName) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Set the acting user.
    #[must_use]
    pub fn with_actor(mut self, actor: &Actor) -> Self {
        self.actor_name = Some(actor.name.clone());
        self.actor_role = Some(actor.role.as_str().to_owned());
        self
    }

    /// Set the comment or reason, if any.
    #[must_use]
    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }

    /// Set the task assignment identifier.
    #[must_use]
    pub fn with_assignment(mut self, assignment_id: impl Into<String>) -> Self {
        self.assignment_id = Some(assignment_id.into());
        self
    }
}

/// Writes structured audit entries to a persistent store.
///
/// Implementations must be [`Send`] and [`Sync`] to allow sharing across
/// async task boundaries via [`std::sync::Arc`].
pub trait AuditLogger: Send + Sync {
    /// Record a single audit entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying write operation fails.
    fn log_entry(&self, entry: AuditEntry) -> crate::Result<()>;
}

pub use writer::JsonlAuditWriter;
