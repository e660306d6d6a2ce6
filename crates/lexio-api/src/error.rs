use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use lexio_learn::{ErrorKind, LearnError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Learn(#[from] LearnError),

    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Learn(ref e) => match e.kind() {
                ErrorKind::BadRequest => (StatusCode::BAD_REQUEST, e.to_string()),
                ErrorKind::NotFound => (StatusCode::NOT_FOUND, e.to_string()),
                ErrorKind::Config => {
                    tracing::error!("Config error: {}", e);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Configuration error".to_string(),
                    )
                }
                ErrorKind::Upstream => {
                    tracing::error!("Upstream error: {}", e);
                    (StatusCode::BAD_GATEWAY, e.to_string())
                }
                ErrorKind::Internal => {
                    tracing::error!("Persistence error: {}", e);
                    (StatusCode::INTERNAL_SERVER_ERROR, "Storage error".to_string())
                }
            },
            ApiError::Internal => {
                tracing::error!("Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
