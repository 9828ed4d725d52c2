//! Conversation identity.
//!
//! A [`ConversationId`] names one logical chat session with the assistant.
//! It is supplied by the caller (usually resolved from a session store) and
//! scopes both the real-time socket and the REST conversation endpoints.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ConversationId
// ---------------------------------------------------------------------------

/// Stable identifier of a chat conversation.
///
/// # Examples
///
/// ```
/// use vacance_models::ConversationId;
///
/// let id = ConversationId::new("3f1c2a");
/// assert_eq!(id.to_string(), "3f1c2a");
///
/// let id2: ConversationId = "3f1c2a".into();
/// assert_eq!(id, id2);
/// assert!(!id.is_empty());
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, Default)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// Create a new `ConversationId` from a string slice.
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    /// Return the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` when the id is empty or whitespace only.
    ///
    /// An empty id never opens a channel.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ConversationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl FromStr for ConversationId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
