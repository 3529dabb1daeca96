use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use parley_chat::ProfileEdit;
use parley_types::api::{Claims, UnreadResponse, UpdateProfileRequest, UserSearchQuery};

use crate::AppState;
use crate::error::blocking;

/// Edit the caller's own profile.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let edit = ProfileEdit {
        first_name: req.first_name,
        last_name: req.last_name,
        bio: req.bio,
        profile_picture: req.profile_picture,
    };
    let accounts = state.services.accounts.clone();
    let user = blocking(move || accounts.update_profile(&claims.email, edit)).await?;
    Ok(Json(user))
}

pub async fn search_users(
    State(state): State<AppState>,
    Query(query): Query<UserSearchQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let accounts = state.services.accounts.clone();
    let users = blocking(move || accounts.search(&query.q)).await?;
    Ok(Json(users))
}

/// Messages waiting for the caller across all conversations.
pub async fn unread(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let messenger = state.services.messenger.clone();
    let unread = blocking(move || messenger.unread_count(&claims.email)).await?;
    Ok(Json(UnreadResponse { unread }))
}
