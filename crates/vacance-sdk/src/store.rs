//! Conversation-id persistence.
//!
//! The channel never generates or stores conversation ids itself. Callers
//! resolve one through a [`ConversationStore`] so the same logical
//! conversation survives a restart of the client.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};
use uuid::Uuid;
use vacance_models::ConversationId;

use crate::error::SdkError;

/// Key under which the current conversation id is stored.
pub const CONVERSATION_KEY: &str = "chat_conversation_id";

const APP_DIR: &str = "vacance";
const STORE_FILE: &str = "session.json";

/// Minimal key-value store.
pub trait ConversationStore {
    /// Read a value.
    fn get(&self, key: &str) -> Option<String>;
    /// Write a value.
    fn set(&self, key: &str, value: &str) -> Result<(), SdkError>;
}

/// Reuse the stored conversation id, or generate and store a new one.
pub fn resolve_conversation_id(store: &dyn ConversationStore) -> Result<ConversationId, SdkError> {
    if let Some(id) = store.get(CONVERSATION_KEY).filter(|id| !id.trim().is_empty()) {
        debug!(conversation = %id, "reusing stored conversation");
        return Ok(ConversationId::from(id));
    }
    let id = Uuid::new_v4().to_string();
    store.set(CONVERSATION_KEY, &id)?;
    debug!(conversation = %id, "started new conversation");
    Ok(ConversationId::from(id))
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Process-local store; forgotten on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl ConversationStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SdkError> {
        self.values
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileStore
// ---------------------------------------------------------------------------

/// Store backed by a JSON object on disk.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Store at an explicit path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store in the platform config directory (`…/vacance/session.json`).
    pub fn in_config_dir() -> Result<Self, SdkError> {
        let dir = dirs::config_dir()
            .ok_or_else(|| SdkError::Config("could not determine config directory".into()))?
            .join(APP_DIR);
        Ok(Self::new(dir.join(STORE_FILE)))
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> HashMap<String, String> {
        if !self.path.exists() {
            return HashMap::new();
        }
        match fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(values) => values,
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "ignoring unreadable session file");
                    HashMap::new()
                }
            },
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read session file");
                HashMap::new()
            }
        }
    }
}

impl ConversationStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.load().remove(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SdkError> {
        let mut values = self.load();
        values.insert(key.to_string(), value.to_string());
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&values)?)?;
        Ok(())
    }
}
