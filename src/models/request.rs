//! Access request model.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::stage::{StageName, StageRecord};
use crate::{AppError, Result};

type Pattern = LazyLock<std::result::Result<Regex, regex::Error>>;

static PHONE_PATTERN: Pattern = LazyLock::new(|| Regex::new(r"^\+?[0-9]{9,15}$"));
static PF_NUMBER_PATTERN: Pattern = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9/-]{2,20}$"));

/// Hospital system a staff member can request access to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    /// Jeeva hospital information system.
    Jeeva,
    /// Wellsoft hospital information system.
    Wellsoft,
    /// Internet access.
    Internet,
}

impl ServiceKind {
    /// Stable snake-case identifier.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jeeva => "jeeva",
            Self::Wellsoft => "wellsoft",
            Self::Internet => "internet",
        }
    }
}

impl Display for ServiceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = AppError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jeeva" => Ok(Self::Jeeva),
            "wellsoft" => Ok(Self::Wellsoft),
            "internet" => Ok(Self::Internet),
            other => Err(AppError::Validation(format!("unknown service: {other}"))),
        }
    }
}

/// What the request is asking for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestSubject {
    /// Access to one or more hospital systems.
    SystemAccess {
        /// Requested systems.
        services: BTreeSet<ServiceKind>,
        /// Jeeva modules, only meaningful when Jeeva is requested.
        #[serde(default)]
        modules: Vec<String>,
    },
    /// Temporary loan of an ICT device.
    DeviceBorrowing {
        /// Device description or inventory name.
        device: String,
        /// Reason for borrowing.
        purpose: String,
        /// Date the device is due back.
        return_by: NaiveDate,
    },
}

/// Whether granted access is permanent or time-limited.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AccessType {
    /// Access with no expiry.
    Permanent,
    /// Access that lapses after `expires_on`, when known.
    Temporary {
        /// Expiry date.
        expires_on: Option<NaiveDate>,
    },
}

/// Terminal cancellation details.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cancellation {
    /// Name of the actor who cancelled.
    pub cancelled_by: String,
    /// Reason given.
    pub reason: Option<String>,
    /// Cancellation timestamp.
    pub cancelled_at: DateTime<Utc>,
}

/// Derived overall status of a request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", content = "stage", rename_all = "snake_case")]
pub enum CurrentStage {
    /// Blocked on the named stage; its role is the required next actor.
    Awaiting(StageName),
    /// Every stage approved; access granted.
    Completed,
    /// Halted at the named rejected stage until resubmitted.
    Rejected(StageName),
    /// Withdrawn before completion.
    Cancelled,
}

impl CurrentStage {
    /// Whether no further stage decision can be made.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Short label, e.g. `hod`, `completed`, `rejected`.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Awaiting(stage) => stage.as_str(),
            Self::Completed => "completed",
            Self::Rejected(_) => "rejected",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Input for creating a new access request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewAccessRequest {
    /// Staff PF number.
    pub pf_number: String,
    /// Staff full name.
    pub staff_name: String,
    /// Contact phone for status SMS.
    pub phone: String,
    /// Department name or code.
    pub department: String,
    /// Requested services or device.
    pub subject: RequestSubject,
    /// Permanent or temporary access.
    pub access_type: AccessType,
}

impl NewAccessRequest {
    /// Validate identity fields and subject shape.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if !matches_pattern(&PF_NUMBER_PATTERN, self.pf_number.trim())? {
            return Err(AppError::Validation(format!(
                "invalid pf_number: {}",
                self.pf_number
            )));
        }
        if self.staff_name.trim().is_empty() {
            return Err(AppError::Validation("staff_name must not be empty".into()));
        }
        if !matches_pattern(&PHONE_PATTERN, self.phone.trim())? {
            return Err(AppError::Validation(format!("invalid phone: {}", self.phone)));
        }
        if self.department.trim().is_empty() {
            return Err(AppError::Validation("department must not be empty".into()));
        }

        match &self.subject {
            RequestSubject::SystemAccess { services, modules } => {
                if services.is_empty() {
                    return Err(AppError::Validation(
                        "at least one service must be requested".into(),
                    ));
                }
                if !modules.is_empty() && !services.contains(&ServiceKind::Jeeva) {
                    return Err(AppError::Validation(
                        "modules may only be requested together with jeeva".into(),
                    ));
                }
            }
            RequestSubject::DeviceBorrowing {
                device, purpose, ..
            } => {
                if device.trim().is_empty() || purpose.trim().is_empty() {
                    return Err(AppError::Validation(
                        "device and purpose must not be empty".into(),
                    ));
                }
            }
        }

        Ok(())
    }
}

fn matches_pattern(pattern: &Pattern, value: &str) -> Result<bool> {
    let re = pattern
        .as_ref()
        .map_err(|err| AppError::Config(format!("invalid validation pattern: {err}")))?;
    Ok(re.is_match(value))
}

/// One staff member's request moving through the approval stages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessRequest {
    /// Unique record identifier.
    pub id: String,
    /// Staff PF number.
    pub pf_number: String,
    /// Staff full name.
    pub staff_name: String,
    /// Contact phone for status SMS.
    pub phone: String,
    /// Department name or code.
    pub department: String,
    /// Requested services or device.
    pub subject: RequestSubject,
    /// Permanent or temporary access.
    pub access_type: AccessType,
    /// One record per stage, in [`StageName::SEQUENCE`] order.
    pub stages: Vec<StageRecord>,
    /// Number of times a rejected stage has been reopened.
    pub resubmission_count: u32,
    /// Timestamp of the most recent resubmission.
    pub last_resubmitted_at: Option<DateTime<Utc>>,
    /// Actor name of the most recent resubmission.
    pub last_resubmitted_by: Option<String>,
    /// Set once the request is withdrawn.
    pub cancellation: Option<Cancellation>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency counter, bumped on every save.
    pub version: i64,
}

impl AccessRequest {
    /// Construct a new request with every stage pending.
    #[must_use]
    pub fn new(input: NewAccessRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            pf_number: input.pf_number.trim().to_owned(),
            staff_name: input.staff_name.trim().to_owned(),
            phone: input.phone.trim().to_owned(),
            department: input.department.trim().to_owned(),
            subject: input.subject,
            access_type: input.access_type,
            stages: StageName::SEQUENCE
                .iter()
                .copied()
                .map(StageRecord::pending)
                .collect(),
            resubmission_count: 0,
            last_resubmitted_at: None,
            last_resubmitted_by: None,
            cancellation: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Record for `stage`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the stage list is malformed.
    pub fn stage(&self, stage: StageName) -> Result<&StageRecord> {
        self.stages
            .get(stage.position())
            .filter(|record| record.stage == stage)
            .ok_or_else(|| AppError::Db(format!("request {} is missing stage {stage}", self.id)))
    }

    /// Check that the stage list holds exactly one record per stage, in order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the list is malformed.
    pub fn check_stage_layout(&self) -> Result<()> {
        let in_order = self.stages.len() == StageName::SEQUENCE.len()
            && self
                .stages
                .iter()
                .zip(StageName::SEQUENCE)
                .all(|(record, stage)| record.stage == stage);
        if in_order {
            Ok(())
        } else {
            Err(AppError::Db(format!(
                "request {} has a malformed stage list",
                self.id
            )))
        }
    }
}
