use thiserror::Error;

use crate::timer::TimerStatus;

/// Failures surfaced to whoever drives the session lifecycle.
///
/// None of these are fatal: the controller is left in the state it was in
/// before the rejected call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("sign in before starting a session")]
    NotAuthenticated,

    #[error("duration must be between {min} and {max} minutes, got {got}")]
    InvalidDuration { got: u32, min: u32, max: u32 },

    #[error("duration can only change while the timer is idle")]
    NotIdle,

    #[error("a session is already in progress ({0:?})")]
    AlreadyActive(TimerStatus),

    #[error("the timer is not running")]
    NotRunning,

    #[error("there is no finished session waiting for review")]
    NoPendingReview,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("name is longer than {max} characters")]
    NameTooLong { max: usize },

    #[error("no profile named '{0}'")]
    UnknownUser(String),

    #[error("a profile named '{0}' already exists")]
    AlreadyExists(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}
