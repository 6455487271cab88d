//! Actor identity and role model.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::AppError;

/// Organisational role an actor holds within the workflow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Ordinary staff member; may submit and resubmit own requests.
    Staff,
    /// Head of department.
    Hod,
    /// Divisional director.
    DivisionalDirector,
    /// Director of ICT.
    IctDirector,
    /// Head of the IT unit; assigns implementation tasks.
    HeadOfIt,
    /// ICT officer who implements approved access.
    IctOfficer,
    /// System administrator.
    Admin,
}

impl Role {
    /// Stable snake-case identifier used in storage and config.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Staff => "staff",
            Self::Hod => "hod",
            Self::DivisionalDirector => "divisional_director",
            Self::IctDirector => "ict_director",
            Self::HeadOfIt => "head_of_it",
            Self::IctOfficer => "ict_officer",
            Self::Admin => "admin",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "staff" => Ok(Self::Staff),
            "hod" => Ok(Self::Hod),
            "divisional_director" => Ok(Self::DivisionalDirector),
            "ict_director" => Ok(Self::IctDirector),
            "head_of_it" => Ok(Self::HeadOfIt),
            "ict_officer" => Ok(Self::IctOfficer),
            "admin" => Ok(Self::Admin),
            other => Err(AppError::Validation(format!("unknown role: {other}"))),
        }
    }
}

/// A resolved caller identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    /// Role used for authorization checks.
    pub role: Role,
    /// Display name recorded on stage signoffs.
    pub name: String,
    /// Staff PF number, when the actor is hospital staff.
    pub pf_number: Option<String>,
    /// Stored signature reference stamped on approvals.
    pub signature_ref: Option<String>,
}

impl Actor {
    /// Construct an actor with no PF number or signature.
    #[must_use]
    pub fn new(role: Role, name: impl Into<String>) -> Self {
        Self {
            role,
            name: name.into(),
            pf_number: None,
            signature_ref: None,
        }
    }

    /// Attach a PF number.
    #[must_use]
    pub fn with_pf_number(mut self, pf_number: impl Into<String>) -> Self {
        self.pf_number = Some(pf_number.into());
        self
    }

    /// Attach a signature reference.
    #[must_use]
    pub fn with_signature(mut self, signature_ref: impl Into<String>) -> Self {
        self.signature_ref = Some(signature_ref.into());
        self
    }
}
