//! # VacanceAI SDK
//!
//! Client-side plumbing for the VacanceAI travel assistant.
//!
//! The SDK provides:
//!
//! * [`ChatChannel`]: reconnecting real-time chat channel with exponential
//!   backoff, an append-only message log and UI-action dispatch.
//! * [`WsConnector`]: WebSocket transport for the channel.
//! * [`ConversationsApi`]: REST client for creating, loading and clearing
//!   conversations.
//! * [`ChatEndpoints`]: canonical backend URLs.
//! * [`ConversationStore`]: conversation-id persistence.
//! * [`SdkError`]: unified error type for all fallible SDK operations.
//!
//! Types from [`vacance_models`] are re-exported for convenience.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use vacance_sdk::{resolve_conversation_id, ChatChannel, ChatConfig, FileStore, WsConnector};
//!
//! # async fn run() -> Result<(), vacance_sdk::SdkError> {
//! let store = FileStore::in_config_dir()?;
//! let id = resolve_conversation_id(&store)?;
//!
//! let mut channel = ChatChannel::new(WsConnector, ChatConfig::from_env());
//! channel.open(id);
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod config;
pub mod conversations;
pub mod endpoint;
pub mod error;
pub mod store;
pub mod telemetry;
pub mod transport;
pub mod websocket;

pub use channel::{ActionHandler, ChannelSnapshot, ChatChannel, ConnectionState};
pub use config::{ChatConfig, RetryPolicy};
pub use conversations::{ConversationHistory, ConversationReply, ConversationsApi};
pub use endpoint::ChatEndpoints;
pub use error::SdkError;
pub use store::{resolve_conversation_id, ConversationStore, FileStore, MemoryStore};
pub use telemetry::{AttrValue, ChatEvent, TelemetrySink, TracingTelemetry};
pub use transport::{Connector, FrameSink, FrameStream};
pub use websocket::WsConnector;

// Re-export model types for ergonomic usage.
pub use vacance_models::{
    ChatMessage, ConversationId, InboundFrame, OutboundFrame, Role, UiAction,
};
