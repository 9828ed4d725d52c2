//! Chat telemetry.
//!
//! The channel reports a handful of named events with small attribute maps.
//! Where they go is up to the [`TelemetrySink`] the caller installs; a
//! channel without a sink records nothing.

use std::fmt;

use tracing::info;

/// Events emitted by the chat channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
pub enum ChatEvent {
    /// The socket opened.
    #[strum(serialize = "chat.connect")]
    Connect,
    /// The socket closed or failed to open.
    #[strum(serialize = "chat.disconnect")]
    Disconnect,
    /// A user message was sent.
    #[strum(serialize = "chat.send")]
    Send,
    /// A frame was received and parsed.
    #[strum(serialize = "chat.receive")]
    Receive,
    /// Transport error, unparsable frame, or exhausted retry budget.
    #[strum(serialize = "chat.error")]
    Error,
}

/// Attribute value: string, integer or boolean.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    /// Text attribute.
    Str(String),
    /// Integer attribute.
    Int(i64),
    /// Boolean attribute.
    Bool(bool),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for AttrValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Attributes attached to one event.
pub type Attributes = [(&'static str, AttrValue)];

/// Destination of chat telemetry.
pub trait TelemetrySink: Send + Sync {
    /// Record one event.
    fn record(&self, event: ChatEvent, attributes: &Attributes);
}

/// Sink that turns every event into a `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn record(&self, event: ChatEvent, attributes: &Attributes) {
        let attrs = attributes
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ");
        info!(target: "vacance::telemetry", event = %event, %attrs, "telemetry");
    }
}
