/// Request extractors with JSON error bodies
///
/// Axum's own [`Json`](axum::Json) extractor rejects bad bodies with a
/// plain-text response. [`ApiJson`] runs the same extraction and turns the
/// rejection into an [`ApiError`] so clients always get `{"error": ...}`.

use axum::extract::{rejection::JsonRejection, FromRequest};

use crate::error::ApiError;

/// JSON request body; rejections become `400` JSON errors
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = match &rejection {
            JsonRejection::MissingJsonContentType(_) => {
                "Expected request with `Content-Type: application/json`".to_string()
            }
            JsonRejection::JsonSyntaxError(_) => "Request body is not valid JSON".to_string(),
            JsonRejection::JsonDataError(_) => {
                format!("Invalid request body: {}", rejection.body_text())
            }
            _ => rejection.body_text(),
        };

        tracing::debug!(error = %rejection.body_text(), "Rejected request body");
        ApiError::BadRequest(message)
    }
}
