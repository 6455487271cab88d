//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Out-of-order, duplicate, or post-terminal stage action.
    StageGateViolation(String),
    /// Resubmission targeted a stage that is not currently rejected.
    InvalidResubmission(String),
    /// A request already has an active task assignment.
    AlreadyAssigned(String),
    /// Actor role does not match the role the action requires.
    UnauthorizedActor(String),
    /// Task assignment lifecycle move is not permitted.
    InvalidTransition(String),
    /// Caller-supplied input failed validation.
    Validation(String),
    /// Requested entity does not exist.
    NotFound(String),
    /// Concurrent writer changed the record between load and save.
    Conflict(String),
    /// Configuration parsing or validation failure.
    Config(String),
    /// Persistence failure when interacting with `SQLite`.
    Db(String),
    /// Notification sink delivery failure.
    Notify(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl AppError {
    /// Whether the error was caused by the caller (4xx-equivalent).
    ///
    /// Client errors are never retried automatically.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::StageGateViolation(_)
                | Self::InvalidResubmission(_)
                | Self::AlreadyAssigned(_)
                | Self::UnauthorizedActor(_)
                | Self::InvalidTransition(_)
                | Self::Validation(_)
                | Self::NotFound(_)
        )
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StageGateViolation(msg) => write!(f, "stage gate violation: {msg}"),
            Self::InvalidResubmission(msg) => write!(f, "invalid resubmission: {msg}"),
            Self::AlreadyAssigned(msg) => write!(f, "already assigned: {msg}"),
            Self::UnauthorizedActor(msg) => write!(f, "unauthorized actor: {msg}"),
            Self::InvalidTransition(msg) => write!(f, "invalid transition: {msg}"),
            Self::Validation(msg) => write!(f, "validation: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Conflict(msg) => write!(f, "conflict: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Db(msg) => write!(f, "db: {msg}"),
            Self::Notify(msg) => write!(f, "notify: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::Notify(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Db(format!("invalid json: {err}"))
    }
}
