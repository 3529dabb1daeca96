//! Live conversation snapshots.
//!
//! Every subscriber of a conversation sees the full ordered message list,
//! first when it subscribes and again after every change. There are no
//! diffs: a subscriber that falls behind just gets the latest snapshot.
//! Publishing re-reads the store while holding the feed lock, so the value
//! left in a channel is always the most recent store state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Result, anyhow};
use tokio::sync::watch;
use tracing::debug;

use parley_types::models::MessageRecord;

use crate::conversation::ConversationKey;

pub type Snapshot = Arc<Vec<MessageRecord>>;

#[derive(Default)]
pub struct ConversationFeed {
    channels: Mutex<HashMap<ConversationKey, watch::Sender<Snapshot>>>,
}

impl ConversationFeed {
    pub fn new() -> Self {
        Self::default()
    }

    fn channels(&self) -> Result<MutexGuard<'_, HashMap<ConversationKey, watch::Sender<Snapshot>>>> {
        self.channels
            .lock()
            .map_err(|e| anyhow!("feed lock poisoned: {}", e))
    }

    /// Register a subscriber. `load` runs only when the conversation has no
    /// live subscribers yet; otherwise the channel already holds the latest
    /// snapshot.
    pub fn subscribe<F>(&self, key: &ConversationKey, load: F) -> Result<Subscription>
    where
        F: FnOnce() -> Result<Vec<MessageRecord>>,
    {
        let mut channels = self.channels()?;

        if let Some(tx) = channels.get(key) {
            if tx.receiver_count() > 0 {
                return Ok(Subscription {
                    key: key.clone(),
                    rx: tx.subscribe(),
                });
            }
        }

        let (tx, rx) = watch::channel(Arc::new(load()?));
        channels.insert(key.clone(), tx);
        debug!("Opened feed for conversation {}", key);
        Ok(Subscription {
            key: key.clone(),
            rx,
        })
    }

    /// Push a fresh snapshot to the conversation's subscribers, if any.
    pub fn publish<F>(&self, key: &ConversationKey, load: F) -> Result<()>
    where
        F: FnOnce() -> Result<Vec<MessageRecord>>,
    {
        let mut channels = self.channels()?;

        let Some(tx) = channels.get(key) else {
            return Ok(());
        };

        if tx.receiver_count() == 0 {
            channels.remove(key);
            debug!("Closed idle feed for conversation {}", key);
            return Ok(());
        }

        tx.send_replace(Arc::new(load()?));
        Ok(())
    }

    pub fn subscriber_count(&self, key: &ConversationKey) -> usize {
        self.channels()
            .map(|channels| channels.get(key).map_or(0, |tx| tx.receiver_count()))
            .unwrap_or(0)
    }
}

/// Handle for one subscriber. Dropping it (or calling [`Subscription::stop`])
/// ends delivery.
#[derive(Debug)]
pub struct Subscription {
    key: ConversationKey,
    rx: watch::Receiver<Snapshot>,
}

impl Subscription {
    pub fn key(&self) -> &ConversationKey {
        &self.key
    }

    /// Latest snapshot. Marks it as observed.
    pub fn current(&mut self) -> Snapshot {
        self.rx.borrow_and_update().clone()
    }

    /// Wait for the next change. `None` once the feed has gone away.
    pub async fn changed(&mut self) -> Option<Snapshot> {
        self.rx.changed().await.ok()?;
        Some(self.current())
    }

    /// The next snapshot if one arrived since the last observation.
    pub fn try_changed(&mut self) -> Option<Snapshot> {
        match self.rx.has_changed() {
            Ok(true) => Some(self.current()),
            _ => None,
        }
    }

    pub fn stop(self) {
        debug!("Subscription to {} stopped", self.key);
    }
}
