use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::protocol::{ErrorBody, ErrorData, ERR_INVALID_ID, ERR_INVALID_SUBSCRIPTION};
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid post ID.")]
    InvalidPostId,
    #[error("Subscription signature does not match.")]
    InvalidSubscription,
    #[error("Missing Authorization header")]
    Unauthorized,
    #[error("Invalid admin token")]
    Forbidden,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidPostId | ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidSubscription | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidPostId => ERR_INVALID_ID,
            ApiError::InvalidSubscription => ERR_INVALID_SUBSCRIPTION,
            ApiError::Unauthorized => "unauthorized",
            ApiError::Forbidden => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(e) => {
                error!("request failed: {:?}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        let body = ErrorBody {
            code: self.code().to_string(),
            message,
            data: ErrorData {
                status: status.as_u16(),
            },
        };
        (status, Json(body)).into_response()
    }
}
