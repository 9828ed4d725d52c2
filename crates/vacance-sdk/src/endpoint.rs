//! Canonical backend paths for the conversation API.
//!
//! Every URL the SDK talks to is built through [`ChatEndpoints`], so the
//! socket and REST clients agree on a single layout.
//!
//! # Layout
//!
//! ```text
//! {ws|wss}://{host}/api/conversations/ws/{id}    ← real-time channel
//! {base}/api/conversations/new                   ← POST, create
//! {base}/api/conversations/{id}                  ← GET history / DELETE clear
//! {base}/api/conversations/{id}/message          ← POST, REST send
//! ```

use vacance_models::ConversationId;

use crate::error::SdkError;

/// Path prefix shared by all conversation endpoints.
const PREFIX: &str = "/api/conversations";

/// Central authority for conversation endpoint URLs.
///
/// # Examples
///
/// ```
/// use vacance_models::ConversationId;
/// use vacance_sdk::ChatEndpoints;
///
/// let id = ConversationId::new("c-1");
/// assert_eq!(
///     ChatEndpoints::conversation_socket("https://api.example.com", &id).unwrap(),
///     "wss://api.example.com/api/conversations/ws/c-1",
/// );
/// assert_eq!(
///     ChatEndpoints::conversation("http://localhost:8080/", &id),
///     "http://localhost:8080/api/conversations/c-1",
/// );
/// ```
pub struct ChatEndpoints;

impl ChatEndpoints {
    // ------------------------------------------------------------------
    // Real-time channel
    // ------------------------------------------------------------------

    /// WebSocket URL of a conversation.
    ///
    /// The scheme follows the base: `https` → `wss`, `http` → `ws`.
    pub fn conversation_socket(api_url: &str, id: &ConversationId) -> Result<String, SdkError> {
        let base = trim(api_url);
        let (scheme, host) = if let Some(host) = base.strip_prefix("https://") {
            ("wss", host)
        } else if let Some(host) = base.strip_prefix("http://") {
            ("ws", host)
        } else {
            return Err(SdkError::Config(format!(
                "API URL must start with http:// or https://, got `{api_url}`"
            )));
        };
        if host.is_empty() {
            return Err(SdkError::Config(format!("API URL has no host: `{api_url}`")));
        }
        Ok(format!("{scheme}://{host}{PREFIX}/ws/{id}"))
    }

    // ------------------------------------------------------------------
    // REST
    // ------------------------------------------------------------------

    /// `POST` here to create a conversation.
    pub fn create(api_url: &str) -> String {
        format!("{}{PREFIX}/new", trim(api_url))
    }

    /// `GET` for history, `DELETE` to clear.
    pub fn conversation(api_url: &str, id: &ConversationId) -> String {
        format!("{}{PREFIX}/{id}", trim(api_url))
    }

    /// `POST` a message without the real-time channel.
    pub fn message(api_url: &str, id: &ConversationId) -> String {
        format!("{}{PREFIX}/{id}/message", trim(api_url))
    }
}

fn trim(api_url: &str) -> &str {
    api_url.trim().trim_end_matches('/')
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> ConversationId {
        ConversationId::new("abc")
    }

    // -- socket -------------------------------------------------------------

    #[test]
    fn plain_http_maps_to_ws() {
        assert_eq!(
            ChatEndpoints::conversation_socket("http://localhost:8080", &id()).unwrap(),
            "ws://localhost:8080/api/conversations/ws/abc",
        );
    }

    #[test]
    fn https_maps_to_wss() {
        assert_eq!(
            ChatEndpoints::conversation_socket("https://vacance.example/", &id()).unwrap(),
            "wss://vacance.example/api/conversations/ws/abc",
        );
    }

    #[test]
    fn base_path_is_kept() {
        assert_eq!(
            ChatEndpoints::conversation_socket("https://example.com/backend", &id()).unwrap(),
            "wss://example.com/backend/api/conversations/ws/abc",
        );
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        assert!(matches!(
            ChatEndpoints::conversation_socket("ftp://example.com", &id()),
            Err(SdkError::Config(_))
        ));
        assert!(matches!(
            ChatEndpoints::conversation_socket("http://", &id()),
            Err(SdkError::Config(_))
        ));
    }

    // -- REST ---------------------------------------------------------------

    #[test]
    fn rest_paths() {
        let base = "http://localhost:8080/";
        assert_eq!(
            ChatEndpoints::create(base),
            "http://localhost:8080/api/conversations/new"
        );
        assert_eq!(
            ChatEndpoints::conversation(base, &id()),
            "http://localhost:8080/api/conversations/abc"
        );
        assert_eq!(
            ChatEndpoints::message(base, &id()),
            "http://localhost:8080/api/conversations/abc/message"
        );
    }
}
