use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// API Error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String, StatusCode),

    #[error("{0:#}")]
    Generation(#[from] anyhow::Error),

    #[error("{0}")]
    InternalError(String),
}

impl ApiError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        ApiError::InvalidInput(msg.into(), StatusCode::UNPROCESSABLE_ENTITY)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_, status) => *status,
            ApiError::Generation(_) | ApiError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidInput(rejection.body_text(), rejection.status())
    }
}

/// Error response structure
#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::InvalidInput(msg, _) => tracing::warn!("Rejected request: {}", msg),
            ApiError::Generation(e) => tracing::error!("Generation error: {:#}", e),
            ApiError::InternalError(msg) => tracing::error!("Internal error: {}", msg),
        }

        let body = Json(ErrorResponse {
            detail: self.to_string(),
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn test_generation_error_is_500_with_detail() {
        let response = ApiError::from(anyhow::anyhow!("model exploded")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["detail"], "model exploded");
    }

    #[tokio::test]
    async fn test_invalid_input_keeps_status() {
        let response =
            ApiError::InvalidInput("bad".to_string(), StatusCode::BAD_REQUEST).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ApiError::invalid("empty").into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
