use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ridepool_core::CoreError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    AuthenticationError(String),
    #[error("{0}")]
    AuthorizationError(String),
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            AppError::AuthorizationError(_) => StatusCode::FORBIDDEN,
            AppError::Core(err) => match err {
                CoreError::NotFound(_) => StatusCode::NOT_FOUND,
                CoreError::Unauthorized(_) => StatusCode::FORBIDDEN,
                CoreError::InvalidState(_) | CoreError::InsufficientSeats { .. } => StatusCode::CONFLICT,
                CoreError::RideNotBookable(_) => StatusCode::GONE,
                CoreError::ValidationError(_) => StatusCode::BAD_REQUEST,
                CoreError::InvariantViolation(_) | CoreError::Storage(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::AuthenticationError(_) => "UNAUTHENTICATED",
            AppError::AuthorizationError(_) => "FORBIDDEN",
            AppError::Core(err) => err.code(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Internal Server Error: {}", self);
            "Internal Server Error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": message,
            "code": self.code(),
        }));

        (status, body).into_response()
    }
}
