use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{error, info, warn};
use uuid::Uuid;

use parley_chat::NewUser;
use parley_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use parley_types::models::AccountStatus;

use crate::AppState;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let email = req.email.trim().to_string();

    // Validate input
    if email.is_empty() || !email.contains('@') || email.len() > 254 {
        return Err(StatusCode::BAD_REQUEST);
    }
    if req.password.len() < 8 {
        return Err(StatusCode::BAD_REQUEST);
    }
    if req.first_name.trim().is_empty() || req.last_name.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    // Check if email is taken
    if state
        .db
        .credentials_by_email(&email)
        .map_err(internal)?
        .is_some()
    {
        return Err(StatusCode::CONFLICT);
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .to_string();

    let user = state
        .db
        .create_user(
            &NewUser {
                email,
                first_name: req.first_name.trim().to_string(),
                last_name: req.last_name.trim().to_string(),
                profile_picture: req.profile_picture,
            },
            &password_hash,
        )
        .map_err(internal)?;

    let token = create_token(&state.jwt_secret, user.id, &user.email).map_err(internal)?;

    info!("Registered {} ({})", user.email, user.id);
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user.id,
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let (user, password) = state
        .db
        .credentials_by_email(req.email.trim())
        .map_err(internal)?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&password).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    if user.account_status == AccountStatus::Disabled {
        warn!("Login refused for disabled account {}", user.email);
        return Err(StatusCode::FORBIDDEN);
    }

    let token = create_token(&state.jwt_secret, user.id, &user.email).map_err(internal)?;

    Ok(Json(LoginResponse {
        user_id: user.id,
        email: user.email,
        token,
    }))
}

pub fn create_token(secret: &str, user_id: Uuid, email: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

fn internal(e: anyhow::Error) -> StatusCode {
    error!("Auth store failure: {:#}", e);
    StatusCode::INTERNAL_SERVER_ERROR
}
