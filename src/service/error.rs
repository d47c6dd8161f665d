use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::{db::StoreError, error::HttpError};

/// The error kinds a lifecycle operation can end in. Every `ServiceError`
/// belongs to exactly one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    InvalidState,
    Conflict,
    Validation,
    Internal,
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("User {0} not found")]
    UserNotFound(Uuid),

    #[error("Job {0} not found")]
    JobNotFound(Uuid),

    #[error("Offer {0} not found")]
    OfferNotFound(Uuid),

    #[error("Booking {0} not found")]
    BookingNotFound(Uuid),

    #[error("User {0} is not authorized to perform this action on job {1}")]
    UnauthorizedJobAccess(Uuid, Uuid),

    #[error("User {0} is not authorized to perform this action on booking {1}")]
    UnauthorizedBookingAccess(Uuid, Uuid),

    #[error("User {0} does not have the {1} role")]
    WrongRole(Uuid, &'static str),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::UserNotFound(_)
            | ServiceError::JobNotFound(_)
            | ServiceError::OfferNotFound(_)
            | ServiceError::BookingNotFound(_) => ErrorKind::NotFound,

            ServiceError::UnauthorizedJobAccess(_, _)
            | ServiceError::UnauthorizedBookingAccess(_, _)
            | ServiceError::WrongRole(_, _) => ErrorKind::Forbidden,

            ServiceError::InvalidState(_) => ErrorKind::InvalidState,

            ServiceError::Conflict(_) => ErrorKind::Conflict,

            ServiceError::Validation(_) => ErrorKind::Validation,

            ServiceError::Database(_) | ServiceError::Other(_) => ErrorKind::Internal,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::InvalidState | ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict(reason) => ServiceError::Conflict(reason),
            StoreError::Timeout(after) => {
                ServiceError::Conflict(format!("Operation aborted after {:?}, please retry", after))
            }
            StoreError::Database(e) => ServiceError::Database(e),
        }
    }
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        match error.kind() {
            ErrorKind::Internal => {
                tracing::error!("Internal error: {}", error);
                HttpError::server_error(crate::error::ErrorMessage::ServerError.to_string())
            }
            _ => HttpError::new(error.to_string(), error.status_code()),
        }
    }
}

impl From<StoreError> for HttpError {
    fn from(error: StoreError) -> Self {
        ServiceError::from(error).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_map_to_statuses() {
        let id = Uuid::new_v4();
        assert_eq!(ServiceError::JobNotFound(id).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ServiceError::UnauthorizedJobAccess(id, id).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::InvalidState("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_store_conflict_maps_to_409() {
        let err: ServiceError = StoreError::Conflict("job changed".into()).into();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let http: HttpError = err.into();
        assert_eq!(http.status, StatusCode::CONFLICT);
        assert!(http.message.contains("job changed"));
    }

    #[test]
    fn test_internal_errors_are_not_leaked_over_http() {
        let http: HttpError = ServiceError::Other("pool exhausted".into()).into();
        assert_eq!(http.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!http.message.contains("pool"));
    }
}
