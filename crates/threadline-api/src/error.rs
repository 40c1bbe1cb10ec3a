use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use threadline_persist::PersistError;
use threadline_turns::TurnError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),

    #[error("Turn processing error: {0}")]
    Turn(TurnError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<TurnError> for ApiError {
    fn from(err: TurnError) -> Self {
        match err {
            TurnError::Validation(msg) => ApiError::BadRequest(msg),
            TurnError::NotFound(_) | TurnError::InvalidState(_) => {
                ApiError::NotFound(err.to_string())
            }
            other => ApiError::Turn(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::Persist(ref e) => {
                tracing::error!("Persistence error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Storage error".to_string())
            }
            ApiError::Turn(ref e) => {
                tracing::error!("Turn error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            ApiError::Config(ref msg) => {
                tracing::error!("Config error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Configuration error".to_string())
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use threadline_llm::LlmError;

    #[test]
    fn test_turn_errors_map_to_status_codes() {
        let cases = [
            (TurnError::Validation("prompt is required".into()), StatusCode::BAD_REQUEST),
            (TurnError::NotFound("Turn t1".into()), StatusCode::NOT_FOUND),
            (TurnError::InvalidState("Turn t1 is completed".into()), StatusCode::NOT_FOUND),
            (
                TurnError::Registry(LlmError::UnknownConfig("x".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
