//! Conversation model.

use crate::id::{self, IdPrefix};
use crate::provider::{ChatMessage, ModelConfig, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TITLE: &str = "New Chat";

/// One chat conversation: ordered messages plus the model configuration they
/// were produced with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    /// Latched once a title has been generated; never generated again.
    #[serde(default)]
    pub title_set: bool,
    pub messages: Vec<ChatMessage>,
    pub config: ModelConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(config: ModelConfig) -> Self {
        let now = Utc::now();
        Self {
            id: id::generate(IdPrefix::Conversation),
            title: DEFAULT_TITLE.to_string(),
            title_set: false,
            messages: Vec::new(),
            config,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.title_set = true;
        self.updated_at = Utc::now();
    }

    /// The most recent user message and the assistant reply to it, the pair
    /// a generated title is derived from.
    pub fn last_exchange(&self) -> Option<(&ChatMessage, &ChatMessage)> {
        let user = self.messages.iter().rev().find(|m| m.role == Role::User)?;
        let assistant = self
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)?;
        Some((user, assistant))
    }
}
