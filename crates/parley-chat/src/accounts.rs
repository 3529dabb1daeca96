//! Account checks, profile edits and the user directory.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use parley_types::models::{AccountStatus, PostKind, UserRecord};

use crate::clock::Clock;
use crate::error::{ChatError, Result, require_identity};
use crate::store::{NewPost, ProfileUpdate, SocialStore, UserStore};

/// A requested profile change. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileEdit {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
}

pub struct Accounts<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for Accounts<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<S: UserStore + SocialStore> Accounts<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// The account behind a session, if it still exists and is enabled.
    /// Sessions are re-checked on every request, so disabling an account
    /// ends sessions that are already open.
    pub fn verify(&self, user_id: Uuid) -> Result<UserRecord> {
        let user = self
            .store
            .user_by_id(user_id)?
            .ok_or_else(|| ChatError::UserNotFound(user_id.to_string()))?;

        if user.account_status == AccountStatus::Disabled {
            warn!("Rejected session for disabled account {}", user.email);
            return Err(ChatError::AccountDisabled);
        }
        Ok(user)
    }

    /// Apply `edit` to the signed-in user. A new profile picture is also
    /// published as a `profilePic` post.
    pub fn update_profile(&self, email: &str, edit: ProfileEdit) -> Result<UserRecord> {
        let email = require_identity(email)?;
        let current = self
            .store
            .user_by_email(email)?
            .ok_or_else(|| ChatError::UserNotFound(email.to_string()))?;

        let first_name = match edit.first_name {
            Some(name) => non_blank(name).ok_or(ChatError::InvalidProfile("first name is empty"))?,
            None => current.first_name.clone(),
        };
        let last_name = match edit.last_name {
            Some(name) => non_blank(name).ok_or(ChatError::InvalidProfile("last name is empty"))?,
            None => current.last_name.clone(),
        };
        let bio = match edit.bio {
            Some(bio) => non_blank(bio),
            None => current.bio.clone(),
        };
        let new_picture = edit
            .profile_picture
            .and_then(non_blank)
            .filter(|url| current.profile_picture.as_deref() != Some(url.as_str()));

        let update = ProfileUpdate {
            first_name,
            last_name,
            bio,
            profile_picture: new_picture.clone().or_else(|| current.profile_picture.clone()),
        };
        let user = self
            .store
            .update_profile(current.id, &update)?
            .ok_or_else(|| ChatError::UserNotFound(email.to_string()))?;

        if let Some(url) = new_picture {
            let post = self.store.insert_post(&NewPost {
                author: user.email.clone(),
                author_name: user.display_name(),
                text: None,
                image_url: Some(url),
                video_url: None,
                kind: PostKind::ProfilePic,
                created_at: self.clock.now(),
            })?;
            info!("{} changed profile picture (post {})", user.email, post.id);
        }

        Ok(user)
    }

    /// Name-prefix search. A blank query finds nobody.
    pub fn search(&self, query: &str) -> Result<Vec<UserRecord>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.store.search_users(query)?)
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
