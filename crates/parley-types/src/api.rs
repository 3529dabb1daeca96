use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Notification, Theme};

// -- JWT Claims --

/// JWT claims shared by parley-api (REST middleware) and parley-gateway
/// (WebSocket Identify).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub profile_picture: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub email: String,
    pub token: String,
}

// -- Users --

/// Fields left out keep their current value.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserSearchQuery {
    #[serde(default)]
    pub q: String,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkSeenResponse {
    pub updated: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadResponse {
    pub unread: usize,
}

// -- Posts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePostRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleResponse {
    /// true when the toggle created the like/follow, false when it removed it.
    pub added: bool,
}

// -- Notifications --

#[derive(Debug, Serialize, Deserialize)]
pub struct NotificationsResponse {
    pub recent: Vec<Notification>,
    pub earlier: Vec<Notification>,
    pub has_unseen: bool,
}

// -- Presence / preferences --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PresenceRequest {
    pub active: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ThemeBody {
    pub dark_mode: Theme,
}

/// The raw `"On"` / `"Off"` flag as the client sends it.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetThemeRequest {
    pub dark_mode: String,
}
