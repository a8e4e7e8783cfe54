use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] validator::ValidationErrors),

    #[error("Invalid quiz key: {0}")]
    InvalidKey(String),

    #[error("Attempt expired at {deadline}")]
    Expired { deadline: chrono::DateTime<chrono::Utc> },

    #[error("Answer sheet {0} has already been graded")]
    AlreadyGraded(uuid::Uuid),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unsupported question type: {0}")]
    UnsupportedQuestionType(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Upstream service error: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            Error::InvalidPayload(_) | Error::Json(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            Error::InvalidKey(_) => (StatusCode::FORBIDDEN, "invalid_key"),
            Error::Expired { .. } => (StatusCode::GONE, "expired"),
            Error::AlreadyGraded(_) => (StatusCode::CONFLICT, "already_graded"),
            Error::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            Error::UnsupportedQuestionType(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "unsupported_question_type")
            }
            Error::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            Error::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            Error::DataIntegrity(_) => (StatusCode::CONFLICT, "data_integrity_error"),
            Error::Upstream(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
            Error::Config(_) | Error::Database(_) | Error::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = self.status_and_code();

        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            match self {
                Error::Upstream(err) => format!("External service error: {}", err),
                _ => "An unexpected error occurred".to_string(),
            }
        } else {
            self.to_string()
        };

        let body = Json(json!({ "error": code, "message": message }));
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err)
                if db_err.is_unique_violation()
                    || db_err.is_foreign_key_violation()
                    || db_err.is_check_violation() =>
            {
                Error::DataIntegrity(db_err.message().to_string())
            }
            other => Error::Database(other),
        }
    }
}
