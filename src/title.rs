//! Conversation title generation.
//!
//! A title is generated at most once per conversation, from its first
//! completed exchange. Failures are swallowed: a missing title never blocks
//! or fails a chat turn.

use crate::config::TimeoutConfig;
use crate::error::Result;
use crate::provider::{
    format_request, parse_completion, ChatMessage, NormalizedRequest, ProviderRegistry, Role,
};
use crate::session::Conversation;
use async_trait::async_trait;
use std::sync::Arc;

/// Anything that can produce a one-shot, non-streamed completion.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, provider_id: &str, request: &NormalizedRequest) -> Result<String>;
}

/// Completion backend that goes through the relay server.
pub struct RelayCompletionBackend {
    registry: Arc<ProviderRegistry>,
    client: reqwest::Client,
    base_url: String,
    timeouts: TimeoutConfig,
}

impl RelayCompletionBackend {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        base_url: impl Into<String>,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            registry,
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            timeouts,
        }
    }
}

#[async_trait]
impl CompletionBackend for RelayCompletionBackend {
    async fn complete(&self, provider_id: &str, request: &NormalizedRequest) -> Result<String> {
        let descriptor = self.registry.get(provider_id)?;
        let mut formatted = format_request(descriptor, request)?;
        if let Some(key) = &descriptor.key {
            formatted["apiKey"] = serde_json::Value::String(key.clone());
        }

        let endpoint = descriptor
            .endpoints
            .first()
            .ok_or_else(|| crate::error::Error::ProviderNotFound(provider_id.to_string()))?;
        let url = format!("{}{}", self.base_url, endpoint);

        let response = self
            .client
            .post(&url)
            .timeout(self.timeouts.request())
            .json(&formatted)
            .send()
            .await?
            .error_for_status()?;

        let body: serde_json::Value = response.json().await?;
        parse_completion(descriptor.id, &body).ok_or_else(|| crate::error::Error::Transport {
            status: None,
            message: "title completion carried no content".to_string(),
        })
    }
}

pub struct TitleGenerator {
    backend: Arc<dyn CompletionBackend>,
    provider_id: String,
    language: String,
}

impl TitleGenerator {
    pub fn new(backend: Arc<dyn CompletionBackend>, provider_id: impl Into<String>) -> Self {
        Self {
            backend,
            provider_id: provider_id.into(),
            language: "en".to_string(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Generate and set a title for the conversation if it needs one.
    ///
    /// No-op when the title is already set or the conversation has fewer than
    /// two messages; neither case touches the network. Backend failures are
    /// logged and swallowed.
    pub async fn maybe_generate(&self, conversation: &mut Conversation) {
        if conversation.title_set || conversation.messages.len() < 2 {
            return;
        }
        let Some((user, assistant)) = conversation.last_exchange() else {
            return;
        };

        let prompt = format!(
            "Generate a title in less than 6 words for the following message (language: {}):\n\"\"\"\nUser: {}\nAssistant: {}\n\"\"\"",
            self.language, user.content, assistant.content
        );
        let request = NormalizedRequest {
            messages: vec![ChatMessage::new(Role::User, prompt)],
            config: conversation.config.clone(),
            stream: false,
        };

        match self.backend.complete(&self.provider_id, &request).await {
            Ok(raw) => {
                let title = cleanup_title(&raw);
                if title.is_empty() {
                    tracing::warn!("title generation returned empty content");
                } else {
                    conversation.set_title(title);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "title generation failed");
            }
        }
    }
}

/// Normalize generated titles: strip quoting, collapse whitespace.
fn cleanup_title(raw: &str) -> String {
    let unquoted: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '"' | '\'' | '`'))
        .collect();
    unquoted.split_whitespace().collect::<Vec<_>>().join(" ")
}
