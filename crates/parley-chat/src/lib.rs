//! Messaging and social core.
//!
//! - `accounts`: session checks, profile edits, user search
//! - `conversation`: deterministic two-party conversation keys
//! - `lifecycle`: `sending -> sent -> seen` read receipts
//! - `messaging`: send / subscribe / mark seen / unsend / inbox
//! - `presence`: activity flag and dark-mode preference
//! - `social`: posts, likes, like notifications, follows
//!
//! Services are generic over the store traits in `store`; `memory` provides
//! an in-process store for tests and tooling.

pub mod accounts;
pub mod clock;
pub mod conversation;
pub mod error;
pub mod feed;
pub mod lifecycle;
pub mod memory;
pub mod messaging;
pub mod presence;
pub mod social;
pub mod store;

use std::sync::Arc;

pub use accounts::{Accounts, ProfileEdit};
pub use clock::{Clock, ManualClock, SystemClock};
pub use conversation::{ConversationKey, sanitize_identifier};
pub use error::{ChatError, Result};
pub use feed::{ConversationFeed, Snapshot, Subscription};
pub use memory::MemoryStore;
pub use messaging::{MessageDraft, Messenger};
pub use presence::{AppPhase, Preferences, Presence};
pub use social::{NotificationInbox, PostDraft, Social};
pub use store::{
    MessageStore, NewMessage, NewPost, NewUser, ProfileUpdate, SocialStore, ToggleOutcome, UserStore,
};

/// Every service over one shared store.
pub struct Services<S> {
    pub accounts: Accounts<S>,
    pub messenger: Messenger<S>,
    pub presence: Presence<S>,
    pub preferences: Preferences<S>,
    pub social: Social<S>,
}

impl<S> Clone for Services<S> {
    fn clone(&self) -> Self {
        Self {
            accounts: self.accounts.clone(),
            messenger: self.messenger.clone(),
            presence: self.presence.clone(),
            preferences: self.preferences.clone(),
            social: self.social.clone(),
        }
    }
}

impl<S: MessageStore + UserStore + SocialStore> Services<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            accounts: Accounts::new(store.clone(), clock.clone()),
            messenger: Messenger::new(store.clone(), clock.clone()),
            presence: Presence::new(store.clone()),
            preferences: Preferences::new(store.clone()),
            social: Social::new(store, clock),
        }
    }
}
