#![deny(missing_docs)]

//! # VacanceAI Models
//!
//! Wire and domain types for the VacanceAI assistant chat channel.
//!
//! ## Frame hierarchy
//!
//! ```text
//! OutboundFrame { message, context? }            client → server
//! InboundFrame  { response?, timestamp?,         server → client
//!                 ui_actions?, agent_type?, error? }
//! └── ChatMessage { role, content, timestamp?, ui_actions? }
//!     └── UiAction (open set, unknown kinds kept verbatim)
//! ```
//!
//! ## Module layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`conversation`] | `ConversationId` |
//! | [`message`] | `Role`, `ChatMessage` |
//! | [`action`] | `UiAction` and its payloads |
//! | [`frame`] | `OutboundFrame`, `InboundFrame` |
//! | [`error`] | `ModelError` |

pub mod action;
pub mod conversation;
pub mod error;
pub mod frame;
pub mod message;

pub use action::*;
pub use conversation::*;
pub use error::*;
pub use frame::*;
pub use message::*;
