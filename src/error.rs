//! HTTP error responses.
//!
//! Every error becomes `{ "error": "<short actionable message>" }`. Internal
//! detail goes to the log, never into the body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::orchestrator::{ErrorKind, GenerateError};

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Invalid email or password.")]
    InvalidCredentials,
    #[error("Sign in to continue.")]
    Unauthorized,
    #[error("Something went wrong. Please try again.")]
    Internal(String),
}

impl ApiError {
    pub fn internal(error: impl std::fmt::Display) -> Self {
        ApiError::Internal(error.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Generate(error) => match error.kind() {
                ErrorKind::MissingPrompt => StatusCode::BAD_REQUEST,
                ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
                ErrorKind::QuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
                ErrorKind::GenerationFailed => StatusCode::BAD_GATEWAY,
                ErrorKind::ProfileUnavailable | ErrorKind::PersistenceFailed => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InvalidCredentials | ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let ApiError::Internal(detail) = &self {
            tracing::error!(%status, detail = %detail, "HTTP error");
        } else if status.is_server_error() {
            tracing::error!(%status, error = ?self, "HTTP error");
        }

        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthError;
    use crate::generation::GenerationError;
    use crate::models::Plan;
    use crate::storage::ProfileError;

    #[test]
    fn generate_errors_map_to_distinct_status_categories() {
        let cases = [
            (GenerateError::MissingPrompt, StatusCode::BAD_REQUEST),
            (
                GenerateError::Unauthenticated(AuthError::Missing),
                StatusCode::UNAUTHORIZED,
            ),
            (
                GenerateError::ProfileUnavailable(ProfileError::NotFound("u".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                GenerateError::QuotaExceeded {
                    plan: Plan::Free,
                    limit: 2,
                },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                GenerateError::GenerationFailed(GenerationError::EmptyResponse),
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError::from(error).status(), status);
        }
    }

    #[test]
    fn body_carries_the_user_message_not_the_cause() {
        let error = ApiError::from(GenerateError::GenerationFailed(GenerationError::Status {
            status: 500,
            body: "upstream stack trace".to_string(),
        }));
        assert_eq!(error.to_string(), "The campaign could not be generated. Please try again.");

        let quota = ApiError::from(GenerateError::QuotaExceeded {
            plan: Plan::Free,
            limit: 2,
        });
        assert!(quota.to_string().contains("Upgrade"));
    }
}
