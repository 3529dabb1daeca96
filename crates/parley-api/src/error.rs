use axum::http::StatusCode;
use tracing::error;

use parley_chat::ChatError;

/// HTTP status for a core failure. Store failures are logged here so
/// handlers can stay on `?`.
pub fn chat_status(err: ChatError) -> StatusCode {
    match err {
        ChatError::MissingCredential => StatusCode::UNAUTHORIZED,
        ChatError::EmptyMessage
        | ChatError::EmptyPost
        | ChatError::SelfFollow
        | ChatError::InvalidTheme(_)
        | ChatError::InvalidProfile(_) => StatusCode::BAD_REQUEST,
        ChatError::NotAuthor | ChatError::NotRecipient | ChatError::AccountDisabled => StatusCode::FORBIDDEN,
        ChatError::UserNotFound(_)
        | ChatError::MessageNotFound(_)
        | ChatError::PostNotFound(_)
        | ChatError::NotificationNotFound(_) => StatusCode::NOT_FOUND,
        ChatError::Store(e) => {
            error!("Store failure: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Run blocking core work off the async runtime.
pub async fn blocking<F, T>(f: F) -> Result<T, StatusCode>
where
    F: FnOnce() -> parley_chat::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(chat_status)
}
