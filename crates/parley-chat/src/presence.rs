//! Activity flag. `active_status` means "was active as of the last observed
//! foreground/background transition". A process that is killed never
//! reports going to the background, so the flag can stay `true`.

use std::sync::Arc;

use tracing::debug;

use parley_types::models::{Theme, UserRecord};

use crate::error::{ChatError, Result, require_identity};
use crate::store::UserStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppPhase {
    Foreground,
    Background,
}

impl AppPhase {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Foreground)
    }
}

pub struct Presence<S> {
    store: Arc<S>,
}

impl<S> Clone for Presence<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: UserStore> Presence<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Record a foreground/background transition for the signed-in user.
    /// `email` is `None` when no credential is cached.
    pub fn transition(&self, email: Option<&str>, phase: AppPhase) -> Result<UserRecord> {
        let email = require_identity(email.unwrap_or_default())?;

        let mut user = self
            .store
            .user_by_email(email)?
            .ok_or_else(|| ChatError::UserNotFound(email.to_string()))?;

        let active = phase.is_active();
        if !self.store.set_active_status(user.id, active)? {
            return Err(ChatError::UserNotFound(email.to_string()));
        }
        user.active_status = active;

        debug!("{} is now {}", email, if active { "active" } else { "inactive" });
        Ok(user)
    }
}

/// Per-user dark-mode flag.
pub struct Preferences<S> {
    store: Arc<S>,
}

impl<S> Clone for Preferences<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: UserStore> Preferences<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Unset means light.
    pub fn theme(&self, email: &str) -> Result<Theme> {
        let user = self.user(email)?;
        Ok(self.store.theme(user.id)?.unwrap_or_default())
    }

    /// Accepts the stored flag strings `"On"` and `"Off"` only.
    pub fn set_theme_flag(&self, email: &str, flag: &str) -> Result<Theme> {
        let theme = Theme::from_flag(flag).ok_or_else(|| ChatError::InvalidTheme(flag.to_string()))?;
        self.set_theme(email, theme)?;
        Ok(theme)
    }

    pub fn set_theme(&self, email: &str, theme: Theme) -> Result<()> {
        let user = self.user(email)?;
        self.store.set_theme(user.id, theme)?;
        Ok(())
    }

    fn user(&self, email: &str) -> Result<UserRecord> {
        let email = require_identity(email)?;
        self.store
            .user_by_email(email)?
            .ok_or_else(|| ChatError::UserNotFound(email.to_string()))
    }
}
