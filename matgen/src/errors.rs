use crate::db::errors::DbError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use utoipa::ToSchema;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Invalid request data, e.g. a missing prompt or a malformed body
    #[error("{message}")]
    BadRequest { message: String },

    /// Uploaded body exceeds the configured size limit
    #[error("{message}")]
    PayloadTooLarge { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// The synthesis or storage capability failed, or produced nothing usable
    #[error("{message}")]
    ServiceUnavailable { message: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Machine-readable error payload returned to clients.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Envelope for every error response: `{"error": {"code": ..., "message": ...}}`
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            // Anything unexpected is reported the same way as a synthesis failure
            Error::ServiceUnavailable { .. } | Error::Database(_) | Error::Other(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Error::BadRequest { .. } => "INVALID_REQUEST",
            Error::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Error::NotFound { .. } => "NOT_FOUND",
            Error::ServiceUnavailable { .. } | Error::Database(_) | Error::Other(_) => "AI_SERVICE_ERROR",
        }
    }

    /// Message surfaced to the caller. Service failures carry the underlying message.
    pub fn user_message(&self) -> String {
        match self {
            Error::BadRequest { message } | Error::PayloadTooLarge { message } | Error::ServiceUnavailable { message } => message.clone(),
            Error::NotFound { resource, .. } => format!("{resource} not found"),
            Error::Database(db_err) => db_err.to_string(),
            Error::Other(err) => err.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(_) | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::ServiceUnavailable { .. } => {
                tracing::warn!("Service error: {}", self);
            }
            Error::BadRequest { .. } | Error::PayloadTooLarge { .. } | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code().to_string(),
                message: self.user_message(),
            },
        };

        (self.status_code(), Json(body)).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let bad = Error::BadRequest {
            message: "prompt is required".to_string(),
        };
        assert_eq!(bad.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(bad.code(), "INVALID_REQUEST");

        let missing = Error::NotFound {
            resource: "Project".to_string(),
            id: "abc".to_string(),
        };
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(missing.user_message(), "Project not found");

        let unexpected = Error::Other(anyhow::anyhow!("disk on fire"));
        assert_eq!(unexpected.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(unexpected.code(), "AI_SERVICE_ERROR");
        assert_eq!(unexpected.user_message(), "disk on fire");

        let db = Error::Database(DbError::NotFound);
        assert_eq!(db.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
