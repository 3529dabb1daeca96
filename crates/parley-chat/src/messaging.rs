use std::sync::Arc;

use tracing::{debug, info, warn};

use parley_types::models::{ConversationSummary, MessageRecord, MessageStatus};

use crate::clock::Clock;
use crate::conversation::ConversationKey;
use crate::error::{ChatError, Result, require_identity};
use crate::feed::{ConversationFeed, Subscription};
use crate::lifecycle;
use crate::store::{MessageStore, NewMessage};

/// Message content as typed by the sender. At least one of text or image.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageDraft {
    text: Option<String>,
    image_url: Option<String>,
}

impl MessageDraft {
    /// Blank text counts as no text.
    pub fn new(text: Option<String>, image_url: Option<String>) -> Result<Self> {
        let text = text.filter(|t| !t.trim().is_empty());
        let image_url = image_url.filter(|u| !u.trim().is_empty());
        if text.is_none() && image_url.is_none() {
            return Err(ChatError::EmptyMessage);
        }
        Ok(Self { text, image_url })
    }

    pub fn text(text: impl Into<String>) -> Result<Self> {
        Self::new(Some(text.into()), None)
    }
}

/// Direct messaging between two users: sending, live snapshots, read
/// receipts and unsend.
pub struct Messenger<S> {
    store: Arc<S>,
    feed: Arc<ConversationFeed>,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for Messenger<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            feed: self.feed.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<S: MessageStore> Messenger<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            feed: Arc::new(ConversationFeed::new()),
            clock,
        }
    }

    /// Write a message from `sender` to `receiver`. The record is stored as
    /// `sending`, then advanced to `sent` once the store has it. A failure
    /// between the two leaves it at `sending`; nothing is retried.
    pub fn send(&self, sender: &str, receiver: &str, draft: MessageDraft) -> Result<MessageRecord> {
        let sender = require_identity(sender)?;
        let receiver = receiver.trim();
        if receiver.is_empty() {
            return Err(ChatError::UserNotFound(String::new()));
        }
        let conversation = ConversationKey::derive(sender, receiver);

        let new = NewMessage {
            conversation: conversation.clone(),
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            text: draft.text,
            image_url: draft.image_url,
            timestamp: self.clock.now(),
        };

        let mut record = self.store.insert_message(&new).map_err(|e| {
            warn!("Failed to store message in {}: {}", conversation, e);
            ChatError::Store(e)
        })?;
        self.publish(&conversation);

        if self.store.advance_status(&conversation, record.id, MessageStatus::Sent)? {
            record.status = MessageStatus::Sent;
        }
        self.publish(&conversation);

        debug!("{} -> {}: message {} in {}", sender, receiver, record.id, conversation);
        Ok(record)
    }

    /// Current messages between `viewer` and `peer`, ordered by storage id.
    pub fn messages(&self, viewer: &str, peer: &str) -> Result<Vec<MessageRecord>> {
        let viewer = require_identity(viewer)?;
        let conversation = ConversationKey::derive(viewer, peer);
        Ok(self.store.messages(&conversation)?)
    }

    /// Live full snapshots of the conversation between `viewer` and `peer`.
    pub fn subscribe(&self, viewer: &str, peer: &str) -> Result<Subscription> {
        let viewer = require_identity(viewer)?;
        let conversation = ConversationKey::derive(viewer, peer);
        let store = &self.store;
        let sub = self
            .feed
            .subscribe(&conversation, || store.messages(&conversation))?;
        debug!("{} subscribed to {}", viewer, conversation);
        Ok(sub)
    }

    /// Mark every message `peer` sent to `viewer` as seen. Returns how many
    /// records actually changed.
    pub fn mark_seen(&self, viewer: &str, peer: &str) -> Result<usize> {
        let viewer = require_identity(viewer)?;
        let conversation = ConversationKey::derive(viewer, peer);

        let mut updated = 0;
        for message in self.store.messages(&conversation)? {
            if lifecycle::awaiting_seen(&message, viewer)
                && self.store.advance_status(&conversation, message.id, MessageStatus::Seen)?
            {
                updated += 1;
            }
        }

        if updated > 0 {
            self.publish(&conversation);
            debug!("{} saw {} message(s) in {}", viewer, updated, conversation);
        }
        Ok(updated)
    }

    /// Delete a message. Only its sender may do this; the check runs before
    /// any delete is issued.
    pub fn unsend(&self, viewer: &str, peer: &str, message_id: u64) -> Result<()> {
        let viewer = require_identity(viewer)?;
        let conversation = ConversationKey::derive(viewer, peer);

        let message = self
            .store
            .message(&conversation, message_id)?
            .ok_or(ChatError::MessageNotFound(message_id))?;

        if !lifecycle::may_unsend(&message, viewer) {
            warn!("{} tried to unsend message {} sent by {}", viewer, message_id, message.sender);
            return Err(ChatError::NotAuthor);
        }

        if !self.store.delete_message(&conversation, message_id, viewer)? {
            return Err(ChatError::MessageNotFound(message_id));
        }
        self.publish(&conversation);

        info!("{} unsent message {} in {}", viewer, message_id, conversation);
        Ok(())
    }

    /// Conversations `viewer` takes part in, most recent first.
    pub fn inbox(&self, viewer: &str) -> Result<Vec<ConversationSummary>> {
        let viewer = require_identity(viewer)?;
        Ok(self.store.conversations_for(viewer)?)
    }

    /// Messages addressed to `viewer`, across every conversation, that are
    /// still `sent`.
    pub fn unread_count(&self, viewer: &str) -> Result<usize> {
        Ok(self.inbox(viewer)?.iter().map(|c| c.unread).sum())
    }

    /// Live subscriptions on the conversation between `a` and `b`.
    pub fn subscriber_count(&self, a: &str, b: &str) -> usize {
        self.feed.subscriber_count(&ConversationKey::derive(a, b))
    }

    fn publish(&self, conversation: &ConversationKey) {
        let store = &self.store;
        if let Err(e) = self.feed.publish(conversation, || store.messages(conversation)) {
            warn!("Failed to publish snapshot for {}: {}", conversation, e);
        }
    }
}
