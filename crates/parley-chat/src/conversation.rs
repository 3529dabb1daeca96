//! Conversation identity.
//!
//! A conversation between two participants is stored under a key derived
//! from both identifiers. The derivation must be byte-identical no matter
//! who opens the conversation, otherwise one thread splits into two halves
//! that never see each other.
//!
//! Sanitization is lossy: `"a.b@x.com"` and `"ab@xcom"` both become
//! `"abxcom"`, so two distinct accounts can end up sharing a key. Nothing
//! here prevents that.

use std::fmt;

/// Strips every character that is not an ASCII letter, digit or underscore.
pub fn sanitize_identifier(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConversationKey(String);

impl ConversationKey {
    /// Sanitize both identifiers, sort them, join with `_`.
    pub fn derive(a: &str, b: &str) -> Self {
        let a = sanitize_identifier(a);
        let b = sanitize_identifier(b);
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("{}_{}", low, high))
    }

    /// Wraps a key read back from storage.
    pub fn from_stored(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
