//! Message lifecycle: `sending -> sent -> seen`.
//!
//! `sent` means the store accepted the write, not that the receiver got it.
//! `seen` is set by the receiver's own session when it scans the
//! conversation. Unsending removes the record outright from any state.
//!
//! Stores apply status writes conditionally through [`can_advance`], so a
//! late `sending` write can never pull a `seen` message backwards.

use parley_types::models::{MessageRecord, MessageStatus};

/// Status assigned before the store has confirmed the write.
pub const INITIAL_STATUS: MessageStatus = MessageStatus::Sending;

/// Whether a stored `from` status may be replaced by `to`.
pub fn can_advance(from: MessageStatus, to: MessageStatus) -> bool {
    to.rank() > from.rank()
}

/// A message addressed to `viewer` that the viewer has not marked seen yet.
pub fn awaiting_seen(message: &MessageRecord, viewer: &str) -> bool {
    message.receiver == viewer && message.status != MessageStatus::Seen
}

/// Only the sender may unsend.
pub fn may_unsend(message: &MessageRecord, viewer: &str) -> bool {
    message.sender == viewer
}
