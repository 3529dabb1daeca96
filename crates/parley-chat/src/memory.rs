use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Result, anyhow};
use chrono::Utc;
use uuid::Uuid;

use parley_types::models::{
    AccountStatus, ConversationSummary, FollowEdge, Like, MessageRecord, MessageStatus,
    Notification, Post, Theme, UserRecord,
};

use crate::conversation::{ConversationKey, sanitize_identifier};
use crate::lifecycle;
use crate::store::{
    MessageStore, NewMessage, NewPost, NewUser, ProfileUpdate, SocialStore, ToggleOutcome, UserStore,
};

/// In-process store. One lock guards all state, so every trait method is
/// atomic with respect to every other.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    next_message_id: u64,
    /// id -> message; BTreeMap keeps insertion (id) order.
    messages: BTreeMap<u64, MessageRecord>,
    users: HashMap<Uuid, UserRecord>,
    themes: HashMap<Uuid, Theme>,
    posts: Vec<Post>,
    /// post id -> liker key -> liker name
    likes: HashMap<Uuid, BTreeMap<String, String>>,
    notifications: Vec<Notification>,
    follows: Vec<FollowEdge>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|e| anyhow!("memory store lock poisoned: {}", e))
    }

    pub fn add_user(&self, user: NewUser) -> Result<UserRecord> {
        let mut state = self.state()?;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(anyhow!("email already registered: {}", user.email));
        }
        let record = UserRecord {
            id: Uuid::new_v4(),
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            profile_picture: user.profile_picture,
            bio: None,
            active_status: false,
            account_status: AccountStatus::Enabled,
            created_at: Utc::now(),
        };
        state.users.insert(record.id, record.clone());
        Ok(record)
    }

    pub fn set_account_status(&self, id: Uuid, status: AccountStatus) -> Result<bool> {
        let mut state = self.state()?;
        Ok(match state.users.get_mut(&id) {
            Some(user) => {
                user.account_status = status;
                true
            }
            None => false,
        })
    }

    /// Overwrite a message's status without the lifecycle guard, the way a
    /// stale client write would land on a store with no conditional update.
    pub fn force_status(&self, id: u64, status: MessageStatus) -> Result<bool> {
        let mut state = self.state()?;
        Ok(match state.messages.get_mut(&id) {
            Some(m) => {
                m.status = status;
                true
            }
            None => false,
        })
    }
}

impl State {
    fn post_with_count(&self, post: &Post) -> Post {
        let mut post = post.clone();
        post.like_count = self.likes.get(&post.id).map_or(0, |l| l.len());
        post
    }

    fn posts_newest_first<'a>(&self, posts: impl Iterator<Item = &'a Post>) -> Vec<Post> {
        let mut out: Vec<Post> = posts.map(|p| self.post_with_count(p)).collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }
}

impl MessageStore for MemoryStore {
    fn insert_message(&self, message: &NewMessage) -> Result<MessageRecord> {
        let mut state = self.state()?;
        state.next_message_id += 1;
        let record = MessageRecord {
            id: state.next_message_id,
            conversation: message.conversation.as_str().to_string(),
            sender: message.sender.clone(),
            receiver: message.receiver.clone(),
            text: message.text.clone(),
            image_url: message.image_url.clone(),
            timestamp: message.timestamp,
            status: lifecycle::INITIAL_STATUS,
        };
        state.messages.insert(record.id, record.clone());
        Ok(record)
    }

    fn messages(&self, conversation: &ConversationKey) -> Result<Vec<MessageRecord>> {
        let state = self.state()?;
        Ok(state
            .messages
            .values()
            .filter(|m| m.conversation == conversation.as_str())
            .cloned()
            .collect())
    }

    fn message(&self, conversation: &ConversationKey, id: u64) -> Result<Option<MessageRecord>> {
        let state = self.state()?;
        Ok(state
            .messages
            .get(&id)
            .filter(|m| m.conversation == conversation.as_str())
            .cloned())
    }

    fn advance_status(&self, conversation: &ConversationKey, id: u64, to: MessageStatus) -> Result<bool> {
        let mut state = self.state()?;
        match state.messages.get_mut(&id) {
            Some(m) if m.conversation == conversation.as_str() && lifecycle::can_advance(m.status, to) => {
                m.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn delete_message(&self, conversation: &ConversationKey, id: u64, author: &str) -> Result<bool> {
        let mut state = self.state()?;
        let owned = state
            .messages
            .get(&id)
            .is_some_and(|m| m.conversation == conversation.as_str() && m.sender == author);
        if owned {
            state.messages.remove(&id);
        }
        Ok(owned)
    }

    fn conversations_for(&self, participant: &str) -> Result<Vec<ConversationSummary>> {
        let state = self.state()?;
        let mut latest: HashMap<&str, &MessageRecord> = HashMap::new();
        for m in state.messages.values() {
            if m.sender == participant || m.receiver == participant {
                // Values iterate in id order, so the last write wins.
                latest.insert(m.conversation.as_str(), m);
            }
        }

        let mut summaries: Vec<ConversationSummary> = latest
            .into_values()
            .map(|m| ConversationSummary {
                conversation: m.conversation.clone(),
                peer: if m.sender == participant { m.receiver.clone() } else { m.sender.clone() },
                last_message: m.clone(),
                unread: state
                    .messages
                    .values()
                    .filter(|u| {
                        u.conversation == m.conversation
                            && u.receiver == participant
                            && u.status == MessageStatus::Sent
                    })
                    .count(),
            })
            .collect();
        summaries.sort_by(|a, b| b.last_message.id.cmp(&a.last_message.id));
        Ok(summaries)
    }
}

impl UserStore for MemoryStore {
    fn user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let state = self.state()?;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    fn user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>> {
        Ok(self.state()?.users.get(&id).cloned())
    }

    fn set_active_status(&self, id: Uuid, active: bool) -> Result<bool> {
        let mut state = self.state()?;
        Ok(match state.users.get_mut(&id) {
            Some(user) => {
                user.active_status = active;
                true
            }
            None => false,
        })
    }

    fn theme(&self, user_id: Uuid) -> Result<Option<Theme>> {
        Ok(self.state()?.themes.get(&user_id).copied())
    }

    fn set_theme(&self, user_id: Uuid, theme: Theme) -> Result<()> {
        self.state()?.themes.insert(user_id, theme);
        Ok(())
    }

    fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<Option<UserRecord>> {
        let mut state = self.state()?;
        Ok(state.users.get_mut(&id).map(|user| {
            user.first_name = update.first_name.clone();
            user.last_name = update.last_name.clone();
            user.bio = update.bio.clone();
            user.profile_picture = update.profile_picture.clone();
            user.clone()
        }))
    }

    fn search_users(&self, prefix: &str) -> Result<Vec<UserRecord>> {
        let prefix = prefix.to_ascii_lowercase();
        let state = self.state()?;
        let mut found: Vec<UserRecord> = state
            .users
            .values()
            .filter(|u| {
                u.first_name.to_ascii_lowercase().starts_with(&prefix)
                    || u.last_name.to_ascii_lowercase().starts_with(&prefix)
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| (&a.first_name, &a.last_name).cmp(&(&b.first_name, &b.last_name)));
        Ok(found)
    }
}

impl SocialStore for MemoryStore {
    fn insert_post(&self, post: &NewPost) -> Result<Post> {
        let mut state = self.state()?;
        let record = Post {
            id: Uuid::new_v4(),
            author: post.author.clone(),
            author_name: post.author_name.clone(),
            text: post.text.clone(),
            image_url: post.image_url.clone(),
            video_url: post.video_url.clone(),
            kind: post.kind,
            created_at: post.created_at,
            like_count: 0,
        };
        state.posts.push(record.clone());
        Ok(record)
    }

    fn post(&self, id: Uuid) -> Result<Option<Post>> {
        let state = self.state()?;
        Ok(state
            .posts
            .iter()
            .find(|p| p.id == id)
            .map(|p| state.post_with_count(p)))
    }

    fn posts(&self) -> Result<Vec<Post>> {
        let state = self.state()?;
        Ok(state.posts_newest_first(state.posts.iter()))
    }

    fn posts_by(&self, author: &str) -> Result<Vec<Post>> {
        let state = self.state()?;
        Ok(state.posts_newest_first(state.posts.iter().filter(|p| p.author == author)))
    }

    fn toggle_like(&self, like: &Like, notification: &Notification) -> Result<ToggleOutcome> {
        let mut guard = self.state()?;
        let state = &mut *guard;
        let likers = state.likes.entry(like.post_id).or_default();
        if likers.remove(&like.liker_key).is_some() {
            if let Some(pos) = state
                .notifications
                .iter()
                .position(|n| n.post_id == like.post_id && sanitize_identifier(&n.sender) == like.liker_key)
            {
                state.notifications.remove(pos);
            }
            Ok(ToggleOutcome::Removed)
        } else {
            likers.insert(like.liker_key.clone(), like.liker_name.clone());
            state.notifications.push(notification.clone());
            Ok(ToggleOutcome::Added)
        }
    }

    fn likes(&self, post_id: Uuid) -> Result<Vec<Like>> {
        let state = self.state()?;
        Ok(state
            .likes
            .get(&post_id)
            .map(|likers| {
                likers
                    .iter()
                    .map(|(key, name)| Like {
                        post_id,
                        liker_key: key.clone(),
                        liker_name: name.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn notifications_for(&self, recipient: &str) -> Result<Vec<Notification>> {
        let state = self.state()?;
        let mut out: Vec<Notification> = state
            .notifications
            .iter()
            .filter(|n| n.recipient == recipient)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    fn notification(&self, id: Uuid) -> Result<Option<Notification>> {
        Ok(self.state()?.notifications.iter().find(|n| n.id == id).cloned())
    }

    fn mark_notification_seen(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state()?;
        Ok(match state.notifications.iter_mut().find(|n| n.id == id) {
            Some(n) => {
                n.seen = true;
                true
            }
            None => false,
        })
    }

    fn delete_notification(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state()?;
        let before = state.notifications.len();
        state.notifications.retain(|n| n.id != id);
        Ok(state.notifications.len() != before)
    }

    fn toggle_follow(&self, edge: &FollowEdge) -> Result<ToggleOutcome> {
        let mut state = self.state()?;
        let existing = state
            .follows
            .iter()
            .position(|f| f.follower == edge.follower && f.followee == edge.followee);
        match existing {
            Some(pos) => {
                state.follows.remove(pos);
                Ok(ToggleOutcome::Removed)
            }
            None => {
                state.follows.push(edge.clone());
                Ok(ToggleOutcome::Added)
            }
        }
    }

    fn followers(&self, user: &str) -> Result<Vec<FollowEdge>> {
        let state = self.state()?;
        Ok(state.follows.iter().filter(|f| f.followee == user).cloned().collect())
    }

    fn following(&self, user: &str) -> Result<Vec<FollowEdge>> {
        let state = self.state()?;
        Ok(state.follows.iter().filter(|f| f.follower == user).cloned().collect())
    }
}
