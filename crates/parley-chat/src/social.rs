//! Posts, likes, like notifications and follows. These are plain lists over
//! the store; ordering is by timestamp, nothing is ranked.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use parley_types::models::{FollowEdge, Like, Notification, Post, PostKind, UserRecord};

use crate::clock::Clock;
use crate::conversation::sanitize_identifier;
use crate::error::{ChatError, Result, require_identity};
use crate::store::{NewPost, SocialStore, ToggleOutcome, UserStore};

/// Notifications younger than this are "recent".
pub const RECENT_WINDOW_HOURS: i64 = 24;

const PREVIEW_WORDS: usize = 8;
const PREVIEW_WORD_CHARS: usize = 15;

#[derive(Debug, Clone, PartialEq)]
pub struct PostDraft {
    text: Option<String>,
    image_url: Option<String>,
    video_url: Option<String>,
}

impl PostDraft {
    pub fn new(text: Option<String>, image_url: Option<String>, video_url: Option<String>) -> Result<Self> {
        let text = text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
        let image_url = image_url.filter(|u| !u.trim().is_empty());
        let video_url = video_url.filter(|u| !u.trim().is_empty());
        if text.is_none() && image_url.is_none() && video_url.is_none() {
            return Err(ChatError::EmptyPost);
        }
        Ok(Self {
            text,
            image_url,
            video_url,
        })
    }
}

/// A user's like notifications, split at [`RECENT_WINDOW_HOURS`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationInbox {
    pub recent: Vec<Notification>,
    pub earlier: Vec<Notification>,
}

impl NotificationInbox {
    pub fn has_unseen(&self) -> bool {
        self.recent.iter().chain(self.earlier.iter()).any(|n| !n.seen)
    }
}

pub struct Social<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for Social<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<S: SocialStore + UserStore> Social<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn create_post(&self, author: &str, draft: PostDraft) -> Result<Post> {
        let user = self.user(author)?;
        let post = self.store.insert_post(&NewPost {
            author: user.email.clone(),
            author_name: user.display_name(),
            text: draft.text,
            image_url: draft.image_url,
            video_url: draft.video_url,
            kind: PostKind::Regular,
            created_at: self.clock.now(),
        })?;
        info!("{} published post {}", user.email, post.id);
        Ok(post)
    }

    /// Every post, newest first.
    pub fn feed(&self) -> Result<Vec<Post>> {
        Ok(self.store.posts()?)
    }

    pub fn posts_by(&self, author: &str) -> Result<Vec<Post>> {
        Ok(self.store.posts_by(author)?)
    }

    pub fn likes(&self, post_id: Uuid) -> Result<Vec<Like>> {
        self.post(post_id)?;
        Ok(self.store.likes(post_id)?)
    }

    /// Like the post, or take the like back if it is already there. Liking
    /// notifies the post's author; unliking withdraws that notification.
    pub fn toggle_like(&self, liker: &str, post_id: Uuid) -> Result<ToggleOutcome> {
        let user = self.user(liker)?;
        let post = self.post(post_id)?;
        let name = user.display_name();

        let like = Like {
            post_id,
            liker_key: sanitize_identifier(&user.email),
            liker_name: name.clone(),
        };
        let notification = Notification {
            id: Uuid::new_v4(),
            post_id,
            recipient: post.author.clone(),
            sender: user.email.clone(),
            sender_name: name,
            message: like_message(post.text.as_deref()),
            created_at: self.clock.now(),
            seen: false,
        };

        let outcome = self.store.toggle_like(&like, &notification)?;
        debug!("{} {:?} like on post {}", user.email, outcome, post_id);
        Ok(outcome)
    }

    pub fn notifications(&self, viewer: &str) -> Result<NotificationInbox> {
        let viewer = require_identity(viewer)?;
        let cutoff = self.clock.now() - Duration::hours(RECENT_WINDOW_HOURS);
        Ok(split_notifications(self.store.notifications_for(viewer)?, cutoff))
    }

    pub fn mark_notification_seen(&self, viewer: &str, id: Uuid) -> Result<()> {
        self.owned_notification(viewer, id)?;
        if !self.store.mark_notification_seen(id)? {
            return Err(ChatError::NotificationNotFound(id));
        }
        Ok(())
    }

    pub fn delete_notification(&self, viewer: &str, id: Uuid) -> Result<()> {
        self.owned_notification(viewer, id)?;
        if !self.store.delete_notification(id)? {
            return Err(ChatError::NotificationNotFound(id));
        }
        Ok(())
    }

    pub fn toggle_follow(&self, follower: &str, followee: &str) -> Result<ToggleOutcome> {
        let follower = self.user(follower)?;
        let followee = self.user(followee)?;
        if follower.id == followee.id {
            return Err(ChatError::SelfFollow);
        }

        let outcome = self.store.toggle_follow(&FollowEdge {
            follower: follower.email.clone(),
            followee: followee.email.clone(),
            created_at: self.clock.now(),
        })?;
        info!("{} {:?} follow of {}", follower.email, outcome, followee.email);
        Ok(outcome)
    }

    pub fn followers(&self, user: &str) -> Result<Vec<FollowEdge>> {
        let user = self.user(user)?;
        Ok(self.store.followers(&user.email)?)
    }

    pub fn following(&self, user: &str) -> Result<Vec<FollowEdge>> {
        let user = self.user(user)?;
        Ok(self.store.following(&user.email)?)
    }

    fn user(&self, email: &str) -> Result<UserRecord> {
        let email = require_identity(email)?;
        self.store
            .user_by_email(email)?
            .ok_or_else(|| ChatError::UserNotFound(email.to_string()))
    }

    fn post(&self, id: Uuid) -> Result<Post> {
        self.store.post(id)?.ok_or(ChatError::PostNotFound(id))
    }

    fn owned_notification(&self, viewer: &str, id: Uuid) -> Result<Notification> {
        let viewer = require_identity(viewer)?;
        let notification = self
            .store
            .notification(id)?
            .ok_or(ChatError::NotificationNotFound(id))?;
        if notification.recipient != viewer {
            return Err(ChatError::NotRecipient);
        }
        Ok(notification)
    }
}

/// Newest first within each half.
pub fn split_notifications(mut all: Vec<Notification>, cutoff: DateTime<Utc>) -> NotificationInbox {
    all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let (recent, earlier) = all.into_iter().partition(|n| n.created_at >= cutoff);
    NotificationInbox { recent, earlier }
}

fn like_message(post_text: Option<&str>) -> String {
    match post_text.map(|t| preview(t, PREVIEW_WORDS, PREVIEW_WORD_CHARS)) {
        Some(p) if !p.is_empty() => format!("recently liked your post: \"{}\"", p),
        _ => "recently liked your post.".to_string(),
    }
}

/// Cut each word to `word_chars` and the text to `words` words, marking
/// every cut with "...".
pub fn preview(text: &str, words: usize, word_chars: usize) -> String {
    let parts: Vec<String> = text
        .split_whitespace()
        .map(|w| {
            if w.chars().count() > word_chars {
                format!("{}...", w.chars().take(word_chars).collect::<String>())
            } else {
                w.to_string()
            }
        })
        .collect();

    if parts.len() > words {
        format!("{}...", parts[..words].join(" "))
    } else {
        parts.join(" ")
    }
}
