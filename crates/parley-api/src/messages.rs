use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use parley_chat::{MessageDraft, UserStore};
use parley_types::api::{Claims, MarkSeenResponse, SendMessageRequest};

use crate::AppState;
use crate::error::{blocking, chat_status};

/// Conversations the caller takes part in, most recent first.
pub async fn inbox(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let messenger = state.services.messenger.clone();
    let conversations = blocking(move || messenger.inbox(&claims.email)).await?;
    Ok(Json(conversations))
}

pub async fn get_messages(
    State(state): State<AppState>,
    Path(peer): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let messenger = state.services.messenger.clone();
    let messages = blocking(move || messenger.messages(&claims.email, &peer)).await?;
    Ok(Json(messages))
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(peer): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let draft = MessageDraft::new(req.text, req.image_url).map_err(chat_status)?;

    let db = state.db.clone();
    let messenger = state.services.messenger.clone();
    let message = blocking(move || {
        // Messages only go to registered users.
        if db.user_by_email(peer.trim())?.is_none() {
            return Err(parley_chat::ChatError::UserNotFound(peer));
        }
        messenger.send(&claims.email, &peer, draft)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn mark_seen(
    State(state): State<AppState>,
    Path(peer): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let messenger = state.services.messenger.clone();
    let updated = blocking(move || messenger.mark_seen(&claims.email, &peer)).await?;
    Ok(Json(MarkSeenResponse { updated }))
}

pub async fn unsend_message(
    State(state): State<AppState>,
    Path((peer, message_id)): Path<(String, u64)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let messenger = state.services.messenger.clone();
    blocking(move || messenger.unsend(&claims.email, &peer, message_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
