use crate::app_error::{AppError, ErrorCode};
use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();

        match self {
            AppError::NotFound(msg) => {
                tracing::debug!(message = %msg, "Resource not found");
                error_resp(StatusCode::NOT_FOUND, code, Some(msg))
            }
            AppError::Conflict(msg) => {
                tracing::warn!(message = %msg, "Request conflicted");
                error_resp(StatusCode::CONFLICT, code, Some(msg))
            }
            AppError::InvalidInput(msg) => {
                tracing::debug!(message = %msg, "Invalid input");
                error_resp(StatusCode::BAD_REQUEST, code, Some(msg))
            }
            AppError::InvalidState(msg) => {
                tracing::warn!(message = %msg, "Invalid state transition");
                error_resp(StatusCode::UNPROCESSABLE_ENTITY, code, Some(msg))
            }
            // Storage and internal details stay in the logs.
            AppError::Storage(detail) => {
                tracing::error!(error = %detail, "Storage failure");
                error_resp(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    code,
                    Some("A storage error occurred".into()),
                )
            }
            AppError::Internal(detail) => {
                tracing::error!(error = %detail, "Internal error");
                error_resp(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    code,
                    Some("An internal error occurred".into()),
                )
            }
        }
    }
}

fn error_resp(status: StatusCode, code: ErrorCode, message: Option<String>) -> Response {
    let body = match message {
        Some(msg) => serde_json::json!({ "code": code.as_str(), "message": msg }),
        None => serde_json::json!({ "code": code.as_str() }),
    };
    (status, Json(body)).into_response()
}
