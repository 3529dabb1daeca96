use uuid::Uuid;

/// Everything a chat or social operation can fail with. Store failures are
/// wrapped as-is; the rest are rejected before anything is written.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("no signed-in user")]
    MissingCredential,

    #[error("account is disabled")]
    AccountDisabled,

    #[error("invalid profile: {0}")]
    InvalidProfile(&'static str),

    #[error("message has no text and no image")]
    EmptyMessage,

    #[error("post has no text, image or video")]
    EmptyPost,

    #[error("only the author of a message can unsend it")]
    NotAuthor,

    #[error("notification belongs to another user")]
    NotRecipient,

    #[error("users cannot follow themselves")]
    SelfFollow,

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("message {0} not found")]
    MessageNotFound(u64),

    #[error("post {0} not found")]
    PostNotFound(Uuid),

    #[error("notification {0} not found")]
    NotificationNotFound(Uuid),

    #[error("invalid dark mode flag '{0}', expected \"On\" or \"Off\"")]
    InvalidTheme(String),

    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

pub type Result<T, E = ChatError> = std::result::Result<T, E>;

/// Returns the trimmed identity, or `MissingCredential` when nobody is signed in.
pub fn require_identity(email: &str) -> Result<&str> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ChatError::MissingCredential);
    }
    Ok(email)
}
