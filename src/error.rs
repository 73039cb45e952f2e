use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::models::Signal;

/// Failures that abort a training run. They never touch the loaded artifacts.
#[derive(thiserror::Error, Debug)]
pub enum TrainingError {
    #[error("No interactions in the training window")]
    EmptyInteractions,

    #[error("No active products to build the content corpus from")]
    EmptyCorpus,

    #[error("No vocabulary terms survived document-frequency pruning")]
    EmptyVocabulary,

    #[error("Malformed interaction for user {user_id}, product {product_id}: {reason}")]
    MalformedInteraction {
        user_id: String,
        product_id: String,
        reason: String,
    },

    #[error("Matrix decomposition failed: {0}")]
    Decomposition(String),

    #[error("Invalid cultural rule: {0}")]
    InvalidRule(String),

    #[error("Inconsistent artifact: {0}")]
    InconsistentArtifact(String),
}

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown region code: {0}")]
    InvalidRegion(String),

    #[error("{0} model is not loaded")]
    ModelUnavailable(Signal),

    #[error("Training failed: {0}")]
    Training(#[from] TrainingError),

    #[error("Artifact store error: {0}")]
    Artifact(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::InvalidRegion(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::ModelUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Database(_)
            | AppError::Cache(_)
            | AppError::Training(_)
            | AppError::Artifact(_)
            | AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::NotFound("u1".into()), StatusCode::NOT_FOUND),
            (AppError::InvalidRegion("XYZ".into()), StatusCode::BAD_REQUEST),
            (
                AppError::ModelUnavailable(Signal::Content),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (AppError::Conflict("busy".into()), StatusCode::CONFLICT),
            (
                AppError::Training(TrainingError::EmptyCorpus),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_model_unavailable_message_names_signal() {
        let error = AppError::ModelUnavailable(Signal::Content);
        assert_eq!(error.to_string(), "content model is not loaded");
    }
}
