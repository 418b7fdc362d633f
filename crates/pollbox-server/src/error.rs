use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pollbox_core::PollError;

/// HTTP-facing wrapper over the core error taxonomy.
///
/// Handlers return this so `?` maps every core failure to a status code
/// and the `{success: false, error}` envelope the frontend expects.
#[derive(Debug)]
pub struct ApiError(pub PollError);

impl From<PollError> for ApiError {
    fn from(err: PollError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            PollError::NotFound => (StatusCode::NOT_FOUND, "Poll not found".to_string()),
            PollError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            PollError::InvalidState(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            PollError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            PollError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error serving request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "success": false,
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
