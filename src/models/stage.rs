//! Approval stage model.
//!
//! A request carries exactly one [`StageRecord`] per [`StageName`], kept in
//! [`StageName::SEQUENCE`] order. The decision payload lives inside the
//! [`StageState`] variant so a pending stage can never carry a stale
//! approver or timestamp.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::actor::Role;
use crate::AppError;

/// One named step in the fixed approval sequence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    /// Head of department review.
    Hod,
    /// Divisional director review.
    DivisionalDirector,
    /// ICT director review.
    IctDirector,
    /// Head of IT review.
    HeadOfIt,
    /// ICT officer implementation; terminal stage.
    IctOfficer,
}

impl StageName {
    /// Fixed traversal order.
    pub const SEQUENCE: [StageName; 5] = [
        StageName::Hod,
        StageName::DivisionalDirector,
        StageName::IctDirector,
        StageName::HeadOfIt,
        StageName::IctOfficer,
    ];

    /// The only role permitted to decide this stage.
    #[must_use]
    pub fn authorized_role(self) -> Role {
        match self {
            Self::Hod => Role::Hod,
            Self::DivisionalDirector => Role::DivisionalDirector,
            Self::IctDirector => Role::IctDirector,
            Self::HeadOfIt => Role::HeadOfIt,
            Self::IctOfficer => Role::IctOfficer,
        }
    }

    /// Zero-based position in [`Self::SEQUENCE`].
    #[must_use]
    pub fn position(self) -> usize {
        match self {
            Self::Hod => 0,
            Self::DivisionalDirector => 1,
            Self::IctDirector => 2,
            Self::HeadOfIt => 3,
            Self::IctOfficer => 4,
        }
    }

    /// Stage that follows this one, if any.
    #[must_use]
    pub fn next(self) -> Option<StageName> {
        Self::SEQUENCE.get(self.position() + 1).copied()
    }

    /// Stable snake-case identifier used in storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hod => "hod",
            Self::DivisionalDirector => "divisional_director",
            Self::IctDirector => "ict_director",
            Self::HeadOfIt => "head_of_it",
            Self::IctOfficer => "ict_officer",
        }
    }

    /// Human-readable label for notifications.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Hod => "HOD",
            Self::DivisionalDirector => "Divisional Director",
            Self::IctDirector => "ICT Director",
            Self::HeadOfIt => "Head of IT",
            Self::IctOfficer => "ICT Officer",
        }
    }
}

impl Display for StageName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageName {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hod" => Ok(Self::Hod),
            "divisional_director" | "divisional" => Ok(Self::DivisionalDirector),
            "ict_director" => Ok(Self::IctDirector),
            "head_of_it" => Ok(Self::HeadOfIt),
            "ict_officer" => Ok(Self::IctOfficer),
            other => Err(AppError::Validation(format!("unknown stage: {other}"))),
        }
    }
}

/// Outcome an approver records against a stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Stage approved; the request moves to the next stage.
    Approve,
    /// Stage rejected; the request halts until resubmitted.
    Reject,
}

impl Decision {
    /// Past-tense label used in events and audit entries.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approved",
            Self::Reject => "rejected",
        }
    }
}

/// Flat status of a stage, without its decision payload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Awaiting a decision.
    Pending,
    /// Approved by the stage's authorized role.
    Approved,
    /// Rejected by the stage's authorized role.
    Rejected,
}

impl StageStatus {
    /// Stable snake-case identifier used in storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// Who decided a stage, when, and with what remarks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageSignoff {
    /// Approver display name.
    pub approver_name: String,
    /// Free-text remarks.
    pub comments: Option<String>,
    /// Stored signature reference.
    pub signature_ref: Option<String>,
    /// Decision timestamp.
    pub decided_at: DateTime<Utc>,
}

/// Decision state of one stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageState {
    /// Awaiting a decision.
    Pending,
    /// Approved with signoff details.
    Approved(StageSignoff),
    /// Rejected with signoff details.
    Rejected(StageSignoff),
}

/// Persisted decision state for one stage of one request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageRecord {
    /// Stage discriminant.
    pub stage: StageName,
    /// Current decision state.
    #[serde(flatten)]
    pub state: StageState,
}

impl StageRecord {
    /// A fresh pending record for `stage`.
    #[must_use]
    pub fn pending(stage: StageName) -> Self {
        Self {
            stage,
            state: StageState::Pending,
        }
    }

    /// Flat status of this stage.
    #[must_use]
    pub fn status(&self) -> StageStatus {
        match self.state {
            StageState::Pending => StageStatus::Pending,
            StageState::Approved(_) => StageStatus::Approved,
            StageState::Rejected(_) => StageStatus::Rejected,
        }
    }

    /// Signoff details for a decided stage.
    #[must_use]
    pub fn signoff(&self) -> Option<&StageSignoff> {
        match &self.state {
            StageState::Pending => None,
            StageState::Approved(signoff) | StageState::Rejected(signoff) => Some(signoff),
        }
    }
}
