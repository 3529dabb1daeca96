use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Enabled,
    Disabled,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "enabled" => Some(Self::Enabled),
            "disabled" => Some(Self::Disabled),
            _ => None,
        }
    }
}

/// A registered account. The email is the identity key used by every other
/// record (messages, posts, likes, follows).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub profile_picture: Option<String>,
    pub bio: Option<String>,
    pub active_status: bool,
    pub account_status: AccountStatus,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

/// Delivery/read state of a message. Deletion is not a status: an unsent
/// message simply disappears from the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sending,
    Sent,
    Seen,
}

impl MessageStatus {
    /// Position in the lifecycle. Status writes only ever move up.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Sending => 0,
            Self::Sent => 1,
            Self::Seen => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Seen => "seen",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sending" => Some(Self::Sending),
            "sent" => Some(Self::Sent),
            "seen" => Some(Self::Seen),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Storage id, assigned by the store in insertion order.
    pub id: u64,
    pub conversation: String,
    pub sender: String,
    pub receiver: String,
    pub text: Option<String>,
    pub image_url: Option<String>,
    /// Sender's clock at send time. Not used for ordering.
    pub timestamp: DateTime<Utc>,
    pub status: MessageStatus,
}

/// One row of a participant's inbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub conversation: String,
    pub peer: String,
    pub last_message: MessageRecord,
    /// Messages addressed to the participant that are still `sent`.
    pub unread: usize,
}

/// What a post is. Profile-picture posts are written by the profile editor,
/// never by the post composer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PostKind {
    #[default]
    Regular,
    ProfilePic,
}

impl PostKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::ProfilePic => "profilePic",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "regular" => Some(Self::Regular),
            "profilePic" => Some(Self::ProfilePic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author: String,
    pub author_name: String,
    pub text: Option<String>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub kind: PostKind,
    pub created_at: DateTime<Utc>,
    pub like_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Like {
    pub post_id: Uuid,
    /// Sanitized liker email.
    pub liker_key: String,
    pub liker_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub post_id: Uuid,
    pub recipient: String,
    pub sender: String,
    pub sender_name: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub seen: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowEdge {
    pub follower: String,
    pub followee: String,
    pub created_at: DateTime<Utc>,
}

/// Dark-mode preference. Persisted as the flag strings `"On"` / `"Off"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Theme {
    #[default]
    #[serde(rename = "Off")]
    Light,
    #[serde(rename = "On")]
    Dark,
}

impl Theme {
    pub fn as_flag(&self) -> &'static str {
        match self {
            Self::Light => "Off",
            Self::Dark => "On",
        }
    }

    pub fn from_flag(s: &str) -> Option<Self> {
        match s {
            "Off" => Some(Self::Light),
            "On" => Some(Self::Dark),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_ranks_follow_lifecycle() {
        assert!(MessageStatus::Sending.rank() < MessageStatus::Sent.rank());
        assert!(MessageStatus::Sent.rank() < MessageStatus::Seen.rank());
    }

    #[test]
    fn status_wire_names() {
        assert_eq!(serde_json::to_string(&MessageStatus::Seen).unwrap(), "\"seen\"");
        assert_eq!(MessageStatus::parse("sent"), Some(MessageStatus::Sent));
        assert_eq!(MessageStatus::parse("delivered"), None);
    }

    #[test]
    fn theme_uses_on_off_flags() {
        assert_eq!(serde_json::to_string(&Theme::Dark).unwrap(), "\"On\"");
        assert_eq!(Theme::from_flag("Off"), Some(Theme::Light));
        assert_eq!(Theme::from_flag("on"), None);
        assert_eq!(Theme::default(), Theme::Light);
    }

    #[test]
    fn post_kind_wire_names() {
        assert_eq!(serde_json::to_string(&PostKind::ProfilePic).unwrap(), "\"profilePic\"");
        assert_eq!(PostKind::parse(PostKind::Regular.as_str()), Some(PostKind::Regular));
        assert_eq!(PostKind::parse("story"), None);
    }
}
