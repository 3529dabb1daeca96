//! Data-access seams. Every service is generic over its store so tests can
//! run against [`crate::memory::MemoryStore`] and the
//! server against the SQLite store in `parley-db`.
//!
//! Methods that flip or advance state (`advance_status`, `delete_message`,
//! `toggle_like`, `toggle_follow`) are single atomic operations in the
//! store. Callers never read-then-write across two calls.

use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use parley_types::models::{
    ConversationSummary, FollowEdge, Like, MessageRecord, MessageStatus, Notification, Post, PostKind,
    Theme, UserRecord,
};

use crate::conversation::ConversationKey;

/// A message about to be written. Validated by the messenger before it gets here.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation: ConversationKey,
    pub sender: String,
    pub receiver: String,
    pub text: Option<String>,
    pub image_url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub author: String,
    pub author_name: String,
    pub text: Option<String>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub kind: PostKind,
    pub created_at: DateTime<Utc>,
}

/// The editable part of a user record, already merged with the current
/// values. The store writes every field as given.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Added,
    Removed,
}

impl ToggleOutcome {
    pub fn added(&self) -> bool {
        matches!(self, Self::Added)
    }
}

pub trait MessageStore: Send + Sync {
    /// Append a message with status `sending`. The store assigns the id;
    /// ids are strictly increasing in insertion order.
    fn insert_message(&self, message: &NewMessage) -> Result<MessageRecord>;

    /// All messages of a conversation, ordered by id.
    fn messages(&self, conversation: &ConversationKey) -> Result<Vec<MessageRecord>>;

    fn message(&self, conversation: &ConversationKey, id: u64) -> Result<Option<MessageRecord>>;

    /// Set the status only if it ranks above the stored one.
    /// Returns whether the write was applied.
    fn advance_status(&self, conversation: &ConversationKey, id: u64, to: MessageStatus) -> Result<bool>;

    /// Delete the message only if `author` sent it. Returns whether a record was removed.
    fn delete_message(&self, conversation: &ConversationKey, id: u64, author: &str) -> Result<bool>;

    /// Latest message of every conversation `participant` sent or received in,
    /// most recent conversation first, with the count of messages addressed
    /// to `participant` that are still `sent`.
    fn conversations_for(&self, participant: &str) -> Result<Vec<ConversationSummary>>;
}

pub trait UserStore: Send + Sync {
    fn user_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    fn user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>>;

    /// Returns false when no such user exists.
    fn set_active_status(&self, id: Uuid, active: bool) -> Result<bool>;

    fn theme(&self, user_id: Uuid) -> Result<Option<Theme>>;

    fn set_theme(&self, user_id: Uuid, theme: Theme) -> Result<()>;

    /// Returns the updated record, or `None` when no such user exists.
    fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<Option<UserRecord>>;

    /// Users whose first or last name starts with `prefix`, ASCII
    /// case-insensitively, ordered by first then last name.
    fn search_users(&self, prefix: &str) -> Result<Vec<UserRecord>>;
}

pub trait SocialStore: Send + Sync {
    fn insert_post(&self, post: &NewPost) -> Result<Post>;

    fn post(&self, id: Uuid) -> Result<Option<Post>>;

    /// Every post, newest first.
    fn posts(&self) -> Result<Vec<Post>>;

    /// One author's posts, newest first.
    fn posts_by(&self, author: &str) -> Result<Vec<Post>>;

    /// Flip `like`. Adding stores `notification` alongside the like;
    /// removing also deletes the notification that like produced, matched by
    /// post and liker key (the same key the like is stored under).
    fn toggle_like(&self, like: &Like, notification: &Notification) -> Result<ToggleOutcome>;

    fn likes(&self, post_id: Uuid) -> Result<Vec<Like>>;

    fn notifications_for(&self, recipient: &str) -> Result<Vec<Notification>>;

    fn notification(&self, id: Uuid) -> Result<Option<Notification>>;

    fn mark_notification_seen(&self, id: Uuid) -> Result<bool>;

    fn delete_notification(&self, id: Uuid) -> Result<bool>;

    /// Flip the (follower, followee) edge.
    fn toggle_follow(&self, edge: &FollowEdge) -> Result<ToggleOutcome>;

    fn followers(&self, user: &str) -> Result<Vec<FollowEdge>>;

    fn following(&self, user: &str) -> Result<Vec<FollowEdge>>;
}
