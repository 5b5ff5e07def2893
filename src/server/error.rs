use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::judge::types::{ErrorCode, JudgeError};

pub type ApiResult<T> = Result<T, ApiError>;

/// Failure body mirroring the compile response shape on the wire.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub error_code: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

/// Rejections resolved before any sandbox work begins. Everything past
/// admission is reported inside a 200-shaped typed payload instead.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    #[allow(dead_code)]
    BadRequest(String),

    #[error("Validation failed")]
    Validation(JudgeError),

    #[error("Rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },

    #[error("Internal server error")]
    #[allow(dead_code)]
    Internal(#[from] anyhow::Error),
}

impl From<JudgeError> for ApiError {
    fn from(err: JudgeError) -> Self {
        match err {
            JudgeError::RateLimited { retry_after_secs } => {
                ApiError::RateLimited { retry_after_secs }
            }
            other => ApiError::Validation(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    success: false,
                    error: msg.clone(),
                    error_code: ErrorCode::InvalidCode,
                    retry_after: None,
                },
            ),
            ApiError::Validation(err) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    success: false,
                    error: err.user_message(),
                    error_code: err.code(),
                    retry_after: None,
                },
            ),
            ApiError::RateLimited { retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                ErrorBody {
                    success: false,
                    error: ErrorCode::RateLimitExceeded.message().to_string(),
                    error_code: ErrorCode::RateLimitExceeded,
                    retry_after: Some(*retry_after_secs),
                },
            ),
            ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    success: false,
                    error: ErrorCode::InternalError.message().to_string(),
                    error_code: ErrorCode::InternalError,
                    retry_after: None,
                },
            ),
        };

        let mut response = (status, Json(body)).into_response();
        if let ApiError::RateLimited { retry_after_secs } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
