// src/controller/error.rs

use crate::error::AppError;

/// Errors surfaced by the session controller. None of them leave the
/// controller wedged: every state that can fail also accepts a retry or cancel.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("sign in to take a verification test")]
    Unauthenticated,

    #[error("skill cannot be tested: {0}")]
    InvalidSkill(String),

    #[error("unknown session: {0}")]
    UnknownSession(String),

    #[error("network failure: {0}")]
    NetworkFailure(String),

    #[error("{operation} is not valid while {phase}")]
    InvalidState {
        operation: &'static str,
        phase: &'static str,
    },

    #[error("question {0} is not part of this session")]
    UnknownQuestion(i64),

    #[error("option is not offered for question {0}")]
    InvalidOption(i64),

    #[error("session has no questions")]
    EmptySession,

    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl ControllerError {
    /// Transient failures; the same call may succeed when retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ControllerError::NetworkFailure(_))
            || matches!(self, ControllerError::Rejected { status, .. } if *status >= 500)
    }
}

impl From<reqwest::Error> for ControllerError {
    fn from(err: reqwest::Error) -> Self {
        ControllerError::NetworkFailure(err.to_string())
    }
}

impl From<AppError> for ControllerError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::AuthError(_) => ControllerError::Unauthenticated,
            AppError::InvalidSkill(msg) => ControllerError::InvalidSkill(msg),
            AppError::UnknownSession(msg) | AppError::SessionExpired(msg) => {
                ControllerError::UnknownSession(msg)
            }
            AppError::BadRequest(message) => ControllerError::Rejected {
                status: 400,
                message,
            },
            AppError::Forbidden(message) => ControllerError::Rejected {
                status: 403,
                message,
            },
            AppError::NotFound(message) => ControllerError::Rejected {
                status: 404,
                message,
            },
            AppError::Conflict(message) => ControllerError::Rejected {
                status: 409,
                message,
            },
            AppError::InternalServerError(message) => ControllerError::Rejected {
                status: 500,
                message,
            },
        }
    }
}
