//! Database row types. These map directly to SQLite rows and convert into
//! the parley-types records; parse failures surface as errors rather than
//! defaulted values.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use uuid::Uuid;

use parley_types::models::{
    AccountStatus, FollowEdge, MessageRecord, MessageStatus, Notification, Post, PostKind, UserRecord,
};

/// Fixed-width RFC 3339 so text order matches time order.
pub fn format_ts(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("corrupt timestamp '{}'", raw))?
        .with_timezone(&Utc))
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("corrupt id '{}'", raw))
}

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub profile_picture: Option<String>,
    pub active_status: bool,
    pub account_status: String,
    pub created_at: String,
    pub bio: Option<String>,
}

impl UserRow {
    pub const COLUMNS: &'static str = "id, email, password, first_name, last_name, profile_picture, \
                                       active_status, account_status, created_at, bio";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            email: row.get(1)?,
            password: row.get(2)?,
            first_name: row.get(3)?,
            last_name: row.get(4)?,
            profile_picture: row.get(5)?,
            active_status: row.get(6)?,
            account_status: row.get(7)?,
            created_at: row.get(8)?,
            bio: row.get(9)?,
        })
    }

    pub fn into_record(self) -> Result<UserRecord> {
        Ok(UserRecord {
            id: parse_uuid(&self.id)?,
            account_status: AccountStatus::parse(&self.account_status)
                .ok_or_else(|| anyhow!("corrupt account_status '{}' on user {}", self.account_status, self.id))?,
            created_at: parse_ts(&self.created_at)?,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            profile_picture: self.profile_picture,
            bio: self.bio,
            active_status: self.active_status,
        })
    }
}

pub struct MessageRow {
    pub id: i64,
    pub conversation: String,
    pub sender: String,
    pub receiver: String,
    pub text: Option<String>,
    pub image_url: Option<String>,
    pub sent_at: String,
    pub status: String,
}

impl MessageRow {
    pub const COLUMNS: &'static str = "id, conversation, sender, receiver, text, image_url, sent_at, status";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            conversation: row.get(1)?,
            sender: row.get(2)?,
            receiver: row.get(3)?,
            text: row.get(4)?,
            image_url: row.get(5)?,
            sent_at: row.get(6)?,
            status: row.get(7)?,
        })
    }

    pub fn into_record(self) -> Result<MessageRecord> {
        Ok(MessageRecord {
            id: u64::try_from(self.id).with_context(|| format!("negative message id {}", self.id))?,
            status: MessageStatus::parse(&self.status)
                .ok_or_else(|| anyhow!("corrupt status '{}' on message {}", self.status, self.id))?,
            timestamp: parse_ts(&self.sent_at)?,
            conversation: self.conversation,
            sender: self.sender,
            receiver: self.receiver,
            text: self.text,
            image_url: self.image_url,
        })
    }
}

pub struct PostRow {
    pub id: String,
    pub author: String,
    pub author_name: String,
    pub text: Option<String>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub kind: String,
    pub created_at: String,
    pub like_count: i64,
}

impl PostRow {
    /// Selects from `posts p` with the like count as the last column.
    pub const SELECT: &'static str = "SELECT p.id, p.author, p.author_name, p.text, p.image_url, \
                                      p.video_url, p.kind, p.created_at, \
                                      (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) \
                                      FROM posts p";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            author: row.get(1)?,
            author_name: row.get(2)?,
            text: row.get(3)?,
            image_url: row.get(4)?,
            video_url: row.get(5)?,
            kind: row.get(6)?,
            created_at: row.get(7)?,
            like_count: row.get(8)?,
        })
    }

    pub fn into_record(self) -> Result<Post> {
        Ok(Post {
            id: parse_uuid(&self.id)?,
            kind: PostKind::parse(&self.kind)
                .ok_or_else(|| anyhow!("corrupt kind '{}' on post {}", self.kind, self.id))?,
            created_at: parse_ts(&self.created_at)?,
            like_count: usize::try_from(self.like_count).unwrap_or_default(),
            author: self.author,
            author_name: self.author_name,
            text: self.text,
            image_url: self.image_url,
            video_url: self.video_url,
        })
    }
}

pub struct NotificationRow {
    pub id: String,
    pub post_id: String,
    pub recipient: String,
    pub sender: String,
    pub sender_name: String,
    pub message: String,
    pub created_at: String,
    pub seen: bool,
}

impl NotificationRow {
    pub const COLUMNS: &'static str = "id, post_id, recipient, sender, sender_name, message, created_at, seen";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            post_id: row.get(1)?,
            recipient: row.get(2)?,
            sender: row.get(3)?,
            sender_name: row.get(4)?,
            message: row.get(5)?,
            created_at: row.get(6)?,
            seen: row.get(7)?,
        })
    }

    pub fn into_record(self) -> Result<Notification> {
        Ok(Notification {
            id: parse_uuid(&self.id)?,
            post_id: parse_uuid(&self.post_id)?,
            created_at: parse_ts(&self.created_at)?,
            recipient: self.recipient,
            sender: self.sender,
            sender_name: self.sender_name,
            message: self.message,
            seen: self.seen,
        })
    }
}

pub struct FollowRow {
    pub follower: String,
    pub followee: String,
    pub created_at: String,
}

impl FollowRow {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            follower: row.get(0)?,
            followee: row.get(1)?,
            created_at: row.get(2)?,
        })
    }

    pub fn into_record(self) -> Result<FollowEdge> {
        Ok(FollowEdge {
            created_at: parse_ts(&self.created_at)?,
            follower: self.follower,
            followee: self.followee,
        })
    }
}
