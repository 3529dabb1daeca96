//! REST surface over the parley core.
//!
//! Every route except `/auth/*` sits behind `middleware::require_auth`,
//! which puts the caller's `Claims` into request extensions.

pub mod auth;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod presence;
pub mod social;
pub mod users;

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post, put},
};

use parley_chat::{Services, SystemClock};
use parley_db::Database;
use parley_gateway::dispatcher::Dispatcher;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    /// Credentials live outside the store traits, so auth talks to the
    /// database directly.
    pub db: Arc<Database>,
    pub services: Services<Database>,
    pub dispatcher: Dispatcher,
    pub jwt_secret: String,
}

impl AppStateInner {
    pub fn new(db: Arc<Database>, dispatcher: Dispatcher, jwt_secret: String) -> AppState {
        let services = Services::new(db.clone(), Arc::new(SystemClock));
        Arc::new(Self {
            db,
            services,
            dispatcher,
            jwt_secret,
        })
    }
}

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/conversations", get(messages::inbox))
        .route("/conversations/unread", get(users::unread))
        .route(
            "/conversations/{peer}/messages",
            get(messages::get_messages).post(messages::send_message),
        )
        .route("/conversations/{peer}/seen", post(messages::mark_seen))
        .route(
            "/conversations/{peer}/messages/{message_id}",
            delete(messages::unsend_message),
        )
        .route("/posts", get(social::feed).post(social::create_post))
        .route("/posts/{post_id}/like", post(social::toggle_like))
        .route("/posts/{post_id}/likes", get(social::get_likes))
        .route("/users", get(users::search_users))
        .route("/users/me", put(users::update_profile))
        .route("/users/{email}/posts", get(social::posts_by))
        .route("/users/{email}/follow", post(social::toggle_follow))
        .route("/users/{email}/followers", get(social::followers))
        .route("/users/{email}/following", get(social::following))
        .route("/notifications", get(social::notifications))
        .route("/notifications/{id}/seen", post(social::mark_notification_seen))
        .route("/notifications/{id}", delete(social::delete_notification))
        .route("/presence", put(presence::set_presence))
        .route(
            "/preferences/theme",
            get(presence::get_theme).put(presence::set_theme),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}
