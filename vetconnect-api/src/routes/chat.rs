/// Booking assistant endpoints
///
/// Public and CSRF-exempt. Conversation state lives in memory, keyed by
/// the `session_id` the server hands back on every reply.
///
/// # Endpoints
///
/// - `POST /api/chat` - `{ "message": "...", "session_id": "..." }`
/// - `POST /api/chat/session/reset` - `{ "session_id": "..." }`

use crate::{
    app::AppState,
    chat::{ChatReply, MAX_MESSAGE_LEN},
    error::{ApiError, ApiResult},
    extract::ApiJson,
};
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,

    pub session_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetRequest {
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetResponse {
    pub session_id: String,
}

/// One conversational turn
///
/// # Response
///
/// ```json
/// { "reply": "...", "session_id": "...", "booking_data": { ... } }
/// ```
///
/// `booking_data` is present only on the turn that confirms a booking.
pub async fn chat(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ChatRequest>,
) -> ApiResult<Json<ChatReply>> {
    if req.message.chars().count() > MAX_MESSAGE_LEN {
        return Err(ApiError::BadRequest(format!(
            "Message must be at most {MAX_MESSAGE_LEN} characters"
        )));
    }

    let reply = state.chat.respond(req.session_id, &req.message).await;
    Ok(Json(reply))
}

/// Drops a conversation and starts a fresh one
pub async fn reset_session(
    State(state): State<AppState>,
    body: Option<Json<ResetRequest>>,
) -> Json<ResetResponse> {
    let Json(req) = body.unwrap_or_default();
    let session_id = state.chat.reset(req.session_id.as_deref());

    Json(ResetResponse { session_id })
}
