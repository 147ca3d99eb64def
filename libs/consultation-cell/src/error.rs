// libs/consultation-cell/src/error.rs
use thiserror::Error;

use shared_models::error::AppError;

use crate::store::RepositoryError;

pub const STALE_STATE_MESSAGE: &str = "Consultation state changed, refresh and retry";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConsultationError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

impl ConsultationError {
    pub fn consultation_not_found() -> Self {
        Self::NotFound("Consultation not found".to_string())
    }

    pub fn user_not_found(what: &str) -> Self {
        Self::NotFound(format!("{} not found", what))
    }

    pub fn stale_state() -> Self {
        Self::Conflict(STALE_STATE_MESSAGE.to_string())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Forbidden(_) => "forbidden",
            Self::Conflict(_) => "conflict",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<RepositoryError> for ConsultationError {
    fn from(err: RepositoryError) -> Self {
        // callers only see a generic message
        tracing::error!("Consultation repository failure: {}", err);
        Self::Internal("Consultation storage unavailable".to_string())
    }
}

impl From<ConsultationError> for AppError {
    fn from(err: ConsultationError) -> Self {
        match err {
            ConsultationError::NotFound(msg) => AppError::NotFound(msg),
            ConsultationError::BadRequest(msg) => AppError::BadRequest(msg),
            ConsultationError::Forbidden(msg) => AppError::Forbidden(msg),
            ConsultationError::Conflict(msg) => AppError::Conflict(msg),
            ConsultationError::Internal(msg) => AppError::Internal(msg),
        }
    }
}
