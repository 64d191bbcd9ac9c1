use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{dao::storage::StorageError, state::session::GameError};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Snapshot store is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Caller is not the host. The reason is only logged.
    #[error("unauthorized")]
    Unauthorized,
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current phase.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<GameError> for ServiceError {
    fn from(err: GameError) -> Self {
        match err {
            GameError::InvalidInput(message) => ServiceError::InvalidInput(message),
            GameError::NotFound(message) => ServiceError::NotFound(message),
            GameError::IllegalTransition(_) => ServiceError::InvalidState(err.to_string()),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Unauthorized access attempt, reported without detail.
    #[error("unauthorized")]
    Unauthorized,
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Unauthorized => AppError::Unauthorized,
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::state_machine::{GameEvent, GamePhase, InvalidTransition};

    #[test]
    fn game_errors_map_to_status_codes() {
        let status = |err: GameError| AppError::from(ServiceError::from(err)).into_response().status();

        assert_eq!(status(GameError::InvalidInput("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(GameError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            status(GameError::IllegalTransition(InvalidTransition::new(
                GamePhase::Selection,
                GameEvent::ShowAnswer,
            ))),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn unauthorized_carries_no_reason() {
        let err = AppError::from(ServiceError::Unauthorized);
        assert_eq!(err.to_string(), "unauthorized");
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
    }
}
