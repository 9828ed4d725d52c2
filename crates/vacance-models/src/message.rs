//! Chat log entries.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::action::UiAction;

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Author of a [`ChatMessage`].
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    /// Typed by the local user.
    User,
    /// Produced by the backend assistant.
    Assistant,
}

// ---------------------------------------------------------------------------
// ChatMessage
// ---------------------------------------------------------------------------

/// One entry of the conversation log.
///
/// `ui_actions` is only ever set on assistant messages.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatMessage {
    /// Server-side identifier, present on entries loaded from history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Who wrote the message.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// ISO-8601 timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Instructions for the UI attached to an assistant reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_actions: Option<Vec<UiAction>>,
}

impl ChatMessage {
    /// A user message stamped with the current UTC time.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: None,
            role: Role::User,
            content: content.into(),
            timestamp: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
            ui_actions: None,
        }
    }

    /// An assistant message as received from the backend.
    pub fn assistant(
        content: impl Into<String>,
        timestamp: Option<String>,
        ui_actions: Option<Vec<UiAction>>,
    ) -> Self {
        Self {
            id: None,
            role: Role::Assistant,
            content: content.into(),
            timestamp,
            ui_actions,
        }
    }

    /// The attached UI actions, or an empty slice.
    pub fn actions(&self) -> &[UiAction] {
        self.ui_actions.as_deref().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
