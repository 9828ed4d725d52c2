//! REST client for the conversation endpoints.
//!
//! The real-time [`ChatChannel`](crate::ChatChannel) is the primary way to
//! talk to the assistant; [`ConversationsApi`] covers the rest of the
//! conversation lifecycle (create, load history, clear) and offers a
//! request/response fallback for sending a message.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use vacance_models::{ChatMessage, ConversationId, OutboundFrame, UiAction};

use crate::endpoint::ChatEndpoints;
use crate::error::SdkError;

/// Stored state of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationHistory {
    /// Conversation id (`id` for stored rows, `conversation_id` for empty ones).
    #[serde(default, alias = "conversation_id")]
    pub id: Option<ConversationId>,
    /// Logged messages, oldest first.
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Context stored alongside the conversation.
    #[serde(default)]
    pub context: Option<Map<String, Value>>,
    /// Creation time, when known.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Last update time, when known.
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Reply to a message sent over REST.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationReply {
    /// Assistant reply text.
    pub response: String,
    /// UI instructions attached to the reply.
    #[serde(default)]
    pub ui_actions: Vec<UiAction>,
    /// Conversation the reply belongs to.
    pub conversation_id: ConversationId,
}

#[derive(Deserialize)]
struct Created {
    conversation_id: ConversationId,
}

/// Client for `/api/conversations`.
#[derive(Debug, Clone)]
pub struct ConversationsApi {
    http: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl ConversationsApi {
    /// Client for the given backend base URL.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into(),
            token: None,
        }
    }

    /// Attach a bearer token to every request.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Create a new, empty conversation.
    pub async fn create(&self) -> Result<ConversationId, SdkError> {
        let req = self.http.post(ChatEndpoints::create(&self.api_url));
        let created: Created = self.execute(req).await?.json().await?;
        debug!(conversation = %created.conversation_id, "conversation created");
        Ok(created.conversation_id)
    }

    /// Load the stored history of a conversation.
    pub async fn history(&self, id: &ConversationId) -> Result<ConversationHistory, SdkError> {
        let req = self.http.get(ChatEndpoints::conversation(&self.api_url, id));
        Ok(self.execute(req).await?.json().await?)
    }

    /// Send a message and wait for the assistant's reply.
    pub async fn send_message(
        &self,
        id: &ConversationId,
        message: &str,
        context: Option<Map<String, Value>>,
    ) -> Result<ConversationReply, SdkError> {
        let body = OutboundFrame::new(message, context);
        let req = self
            .http
            .post(ChatEndpoints::message(&self.api_url, id))
            .json(&body);
        Ok(self.execute(req).await?.json().await?)
    }

    /// Clear the stored history of a conversation.
    pub async fn clear(&self, id: &ConversationId) -> Result<(), SdkError> {
        let req = self.http.delete(ChatEndpoints::conversation(&self.api_url, id));
        self.execute(req).await?;
        Ok(())
    }

    async fn execute(
        &self,
        mut req: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, SdkError> {
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let res = req.send().await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await?;
            return Err(SdkError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(res)
    }
}
