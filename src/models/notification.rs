//! Stage transition events and their notification delivery records.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::actor::Role;
use crate::models::stage::{Decision, StageName};
use crate::AppError;

/// Emitted whenever a stage is approved or rejected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageTransitioned {
    /// Request the decision belongs to.
    pub request_id: String,
    /// Stage that was decided.
    pub stage: StageName,
    /// Outcome recorded.
    pub decision: Decision,
    /// Approver display name.
    pub actor_name: String,
    /// Approver role.
    pub actor_role: Role,
    /// Remarks recorded with the decision.
    pub comment: Option<String>,
    /// Requesting staff member's name.
    pub staff_name: String,
    /// Requesting staff member's phone.
    pub phone: String,
    /// Stage now awaited, or `None` when halted or complete.
    pub next_stage: Option<StageName>,
    /// Decision timestamp.
    pub occurred_at: DateTime<Utc>,
}

impl StageTransitioned {
    /// One-line human summary used by SMS and chat sinks.
    #[must_use]
    pub fn summary(&self) -> String {
        let short_id: String = self.request_id.chars().take(8).collect();
        match (self.decision, self.next_stage) {
            (Decision::Approve, Some(next)) => format!(
                "Access request {short_id} for {}: {} approved by {}. Awaiting {}.",
                self.staff_name,
                self.stage.label(),
                self.actor_name,
                next.label()
            ),
            (Decision::Approve, None) => format!(
                "Access request {short_id} for {}: implemented by {}. Access granted.",
                self.staff_name, self.actor_name
            ),
            (Decision::Reject, _) => format!(
                "Access request {short_id} for {}: rejected at {} by {}. Reason: {}",
                self.staff_name,
                self.stage.label(),
                self.actor_name,
                self.comment.as_deref().unwrap_or("none given")
            ),
        }
    }
}

/// Delivery state of a notification record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Queued, not yet delivered.
    Pending,
    /// Delivered to every configured sink.
    Sent,
    /// Last delivery attempt failed.
    Failed,
}

impl DeliveryStatus {
    /// Stable snake-case identifier used in storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

impl Display for DeliveryStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            other => Err(AppError::Db(format!("invalid delivery status: {other}"))),
        }
    }
}

/// Persisted delivery record for one emitted event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationRecord {
    /// Unique record identifier.
    pub id: String,
    /// The event to deliver.
    pub event: StageTransitioned,
    /// Current delivery state.
    pub status: DeliveryStatus,
    /// Delivery attempts made so far.
    pub attempts: u32,
    /// Error from the most recent failed attempt.
    pub last_error: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of successful delivery.
    pub delivered_at: Option<DateTime<Utc>>,
}

impl NotificationRecord {
    /// Construct a pending record for `event`.
    #[must_use]
    pub fn new(event: StageTransitioned) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event,
            status: DeliveryStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
            delivered_at: None,
        }
    }
}
