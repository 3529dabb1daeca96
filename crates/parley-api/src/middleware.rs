use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::{Authorization, HeaderMapExt};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::warn;

use parley_chat::ChatError;
use parley_types::api::Claims;

use crate::AppState;
use crate::error::blocking;

/// Extract and validate JWT from Authorization header, then check that the
/// account behind it still exists and is enabled.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let claims = decode_token(&state.jwt_secret, bearer.token()).ok_or(StatusCode::UNAUTHORIZED)?;

    let accounts = state.services.accounts.clone();
    let user_id = claims.sub;
    blocking(move || match accounts.verify(user_id) {
        Err(ChatError::UserNotFound(_)) => {
            warn!("Token for unknown account {}", user_id);
            Err(ChatError::AccountDisabled)
        }
        other => other,
    })
    .await?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

pub fn decode_token(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}
