//! Frames exchanged over the conversation socket.
//!
//! ```text
//! client → server   { "message": "…", "context": { … } }
//! server → client   { "response": "…", "timestamp": "…", "ui_actions": [ … ] }
//! server → client   { "error": "…" }
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::action::UiAction;
use crate::error::ModelError;
use crate::message::ChatMessage;

// ---------------------------------------------------------------------------
// OutboundFrame
// ---------------------------------------------------------------------------

/// A user message sent to the assistant.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OutboundFrame {
    /// The user's text.
    pub message: String,
    /// Free-form page / user context forwarded to the assistant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
}

impl OutboundFrame {
    /// Build a frame.
    pub fn new(message: impl Into<String>, context: Option<Map<String, Value>>) -> Self {
        Self {
            message: message.into(),
            context,
        }
    }

    /// Serialize to the JSON text sent on the socket.
    pub fn encode(&self) -> Result<String, ModelError> {
        serde_json::to_string(self).map_err(ModelError::InvalidFrame)
    }
}

// ---------------------------------------------------------------------------
// InboundFrame
// ---------------------------------------------------------------------------

/// A frame pushed by the assistant.
///
/// Every field is optional: the server sends either a reply or an error.
/// Decoding is lenient past the JSON parse. A field of an unexpected type
/// reads as absent, and `error` may hold any JSON value.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct InboundFrame {
    /// Assistant reply text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    /// Server timestamp of the reply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// UI instructions attached to the reply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui_actions: Option<Vec<UiAction>>,
    /// Which backend agent produced the reply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
    /// Application-level error reported by the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl InboundFrame {
    /// Parse a frame from socket text.
    ///
    /// Fails only when `text` is not JSON.
    pub fn decode(text: &str) -> Result<Self, ModelError> {
        let value: Value = serde_json::from_str(text).map_err(ModelError::InvalidFrame)?;
        Ok(Self::from_value(value))
    }

    /// Read a frame out of an already parsed JSON value. Never fails; a
    /// value that is not an object yields an empty frame.
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut fields) = value else {
            return Self::default();
        };
        let ui_actions = match fields.remove("ui_actions") {
            Some(Value::Array(items)) => Some(items.into_iter().map(UiAction::from_value).collect()),
            _ => None,
        };
        Self {
            response: take_string(&mut fields, "response"),
            timestamp: take_string(&mut fields, "timestamp"),
            ui_actions,
            agent_type: take_string(&mut fields, "agent_type"),
            error: fields.remove("error"),
        }
    }

    /// The server-reported error, if any.
    ///
    /// Present when `error` is truthy: `null`, `false`, `0` and `""` count
    /// as no error, objects and arrays always count.
    pub fn server_error(&self) -> Option<&Value> {
        self.error.as_ref().filter(|e| is_truthy(e))
    }

    /// Turn a reply frame into the assistant log entry.
    pub fn into_message(self) -> ChatMessage {
        ChatMessage::assistant(
            self.response.unwrap_or_default(),
            self.timestamp,
            self.ui_actions,
        )
    }
}

impl<'de> Deserialize<'de> for InboundFrame {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(Self::from_value)
    }
}

fn take_string(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
    match fields.remove(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
