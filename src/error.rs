//! Error types for atarefa
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad input, missing person/team/invitation/task)
//! - 3: Blocked by policy (membership guard, duplicate invitation, invalid transition)
//! - 4: Operation failed (I/O, lock contention, notification sender)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the atarefa CLI
pub mod exit_codes {
    pub const USER_ERROR: i32 = 2;
    pub const POLICY_BLOCKED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Failure of the external invitation e-mail sender.
///
/// Kept apart from [`Error`] because a failed send never rolls back the
/// invitation record that triggered it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("invitation e-mail endpoint is not configured")]
    NotConfigured,

    #[error("invitation e-mail request failed: {0}")]
    Transport(String),

    #[error("invitation e-mail rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
}

/// Main error type for atarefa operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Person not found: {0}")]
    PersonNotFound(String),

    #[error("Team not found: {0}")]
    TeamNotFound(String),

    #[error("Invitation not found: {0}")]
    InvitationNotFound(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("No logged-in user could be resolved")]
    NoIdentity,

    #[error("No team selected")]
    NoCurrentTeam,

    // Policy blocks (exit code 3)
    #[error("A pending invitation already exists for {person} in team {team}")]
    DuplicatePending { team: String, person: String },

    #[error("{person} still has pending work: {} task(s) assigned", tasks.len())]
    BlockedByPendingTask { person: String, tasks: Vec<String> },

    #[error("Invitation {id} is already {status}")]
    InvalidTransition { id: String, status: String },

    #[error("Task {task} belongs to {found}, not to partition {expected}")]
    PartitionMismatch {
        task: String,
        expected: String,
        found: String,
    },

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error(transparent)]
    Notification(#[from] NotifyError),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::Validation(_)
            | Error::InvalidArgument(_)
            | Error::InvalidConfig(_)
            | Error::PersonNotFound(_)
            | Error::TeamNotFound(_)
            | Error::InvitationNotFound(_)
            | Error::TaskNotFound(_)
            | Error::NoIdentity
            | Error::NoCurrentTeam => exit_codes::USER_ERROR,

            // Policy blocks
            Error::DuplicatePending { .. }
            | Error::BlockedByPendingTask { .. }
            | Error::InvalidTransition { .. }
            | Error::PartitionMismatch { .. } => exit_codes::POLICY_BLOCKED,

            // Operation failures
            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_)
            | Error::Notification(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured details for machine-readable output, when the error has any
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::BlockedByPendingTask { person, tasks } => Some(serde_json::json!({
                "person": person,
                "pending_tasks": tasks,
            })),
            Error::DuplicatePending { team, person } => Some(serde_json::json!({
                "team": team,
                "person": person,
            })),
            Error::PartitionMismatch {
                task,
                expected,
                found,
            } => Some(serde_json::json!({
                "task": task,
                "expected": expected,
                "found": found,
            })),
            _ => None,
        }
    }
}

/// Result type alias for atarefa operations
pub type Result<T> = std::result::Result<T, Error>;
