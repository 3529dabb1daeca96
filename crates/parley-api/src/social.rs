use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use parley_chat::PostDraft;
use parley_types::api::{Claims, CreatePostRequest, NotificationsResponse, ToggleResponse};

use crate::AppState;
use crate::error::{blocking, chat_status};

// -- Posts --

/// Every post, newest first.
pub async fn feed(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let social = state.services.social.clone();
    let posts = blocking(move || social.feed()).await?;
    Ok(Json(posts))
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let draft = PostDraft::new(req.text, req.image_url, req.video_url).map_err(chat_status)?;
    let social = state.services.social.clone();
    let post = blocking(move || social.create_post(&claims.email, draft)).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn posts_by(
    State(state): State<AppState>,
    Path(email): Path<String>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let social = state.services.social.clone();
    let posts = blocking(move || social.posts_by(&email)).await?;
    Ok(Json(posts))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let social = state.services.social.clone();
    let outcome = blocking(move || social.toggle_like(&claims.email, post_id)).await?;
    Ok(Json(ToggleResponse {
        added: outcome.added(),
    }))
}

pub async fn get_likes(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let social = state.services.social.clone();
    let likes = blocking(move || social.likes(post_id)).await?;
    Ok(Json(likes))
}

// -- Follows --

pub async fn toggle_follow(
    State(state): State<AppState>,
    Path(email): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let social = state.services.social.clone();
    let outcome = blocking(move || social.toggle_follow(&claims.email, &email)).await?;
    Ok(Json(ToggleResponse {
        added: outcome.added(),
    }))
}

pub async fn followers(
    State(state): State<AppState>,
    Path(email): Path<String>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let social = state.services.social.clone();
    let edges = blocking(move || social.followers(&email)).await?;
    Ok(Json(edges))
}

pub async fn following(
    State(state): State<AppState>,
    Path(email): Path<String>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let social = state.services.social.clone();
    let edges = blocking(move || social.following(&email)).await?;
    Ok(Json(edges))
}

// -- Notifications --

pub async fn notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let social = state.services.social.clone();
    let inbox = blocking(move || social.notifications(&claims.email)).await?;
    let has_unseen = inbox.has_unseen();
    Ok(Json(NotificationsResponse {
        recent: inbox.recent,
        earlier: inbox.earlier,
        has_unseen,
    }))
}

pub async fn mark_notification_seen(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let social = state.services.social.clone();
    blocking(move || social.mark_notification_seen(&claims.email, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let social = state.services.social.clone();
    blocking(move || social.delete_notification(&claims.email, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
