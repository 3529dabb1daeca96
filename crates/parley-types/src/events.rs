use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::MessageRecord;

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, email: String },

    /// Full ordered message list of the open conversation. Sent once on
    /// open and again after every change.
    ConversationSnapshot {
        conversation: String,
        messages: Vec<MessageRecord>,
    },

    /// A user's activity flag changed
    PresenceUpdate {
        user_id: Uuid,
        email: String,
        active: bool,
    },

    /// A command could not be carried out
    Error { message: String },
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Start receiving snapshots for the conversation with `peer`.
    /// Replaces any previously open conversation.
    OpenConversation { peer: String },

    /// Stop receiving snapshots.
    CloseConversation,

    /// Mark every message from `peer` to us as seen.
    MarkSeen { peer: String },
}
