use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};

use parley_chat::AppPhase;
use parley_types::api::{Claims, PresenceRequest, SetThemeRequest, ThemeBody};
use parley_types::events::GatewayEvent;

use crate::AppState;
use crate::error::blocking;

/// Foreground/background report from a client that is not holding a
/// gateway connection open.
pub async fn set_presence(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PresenceRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let phase = if req.active {
        AppPhase::Foreground
    } else {
        AppPhase::Background
    };
    let presence = state.services.presence.clone();
    let email = claims.email;
    let user = blocking(move || presence.transition(Some(&email), phase)).await?;

    state.dispatcher.broadcast(GatewayEvent::PresenceUpdate {
        user_id: user.id,
        email: user.email.clone(),
        active: user.active_status,
    });
    Ok(Json(user))
}

pub async fn get_theme(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let preferences = state.services.preferences.clone();
    let dark_mode = blocking(move || preferences.theme(&claims.email)).await?;
    Ok(Json(ThemeBody { dark_mode }))
}

pub async fn set_theme(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SetThemeRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let preferences = state.services.preferences.clone();
    let dark_mode = blocking(move || preferences.set_theme_flag(&claims.email, &req.dark_mode)).await?;
    Ok(Json(ThemeBody { dark_mode }))
}
