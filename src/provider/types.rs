//! Provider and model type definitions.
//!
//! This module contains the core type definitions for AI providers and models,
//! the normalized request/response shapes exchanged with the streaming
//! pipeline, and the per-conversation model configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Lower bound applied to `max_tokens` regardless of what the caller asks for.
pub const MIN_MAX_TOKENS: u64 = 100;

/// Identifier for a supported vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    OpenAi,
    Anthropic,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenAi => "openai",
            ProviderId::Anthropic => "anthropic",
        }
    }

    /// All supported provider ids.
    pub fn all() -> &'static [ProviderId] {
        &[ProviderId::OpenAi, ProviderId::Anthropic]
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "openai" => Ok(ProviderId::OpenAi),
            "anthropic" => Ok(ProviderId::Anthropic),
            other => Err(Error::ProviderNotFound(other.to_string())),
        }
    }
}

/// Capability flags for a provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderCapabilities {
    /// Supports extended thinking/reasoning budgets
    pub supports_thinking: bool,
    /// Supports image input
    pub supports_vision: bool,
    /// Supports file attachments
    pub supports_file_upload: bool,
}

/// Cost per million tokens, in dollars.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ModelCost {
    pub input: f64,
    pub output: f64,
}

/// Immutable description of a single model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Model ID as sent on the wire
    pub id: String,
    /// Display name
    pub name: String,
    /// Maximum total tokens (prompt + completion)
    pub context_window: u64,
    /// Maximum completion tokens per request
    pub max_completion_tokens: u64,
    /// Completion budget used when the caller does not pick one
    pub default_response_tokens: u64,
    /// Per-token pricing
    pub cost: ModelCost,
}

impl ModelDescriptor {
    /// Invariant: `default_response_tokens <= max_completion_tokens <= context_window`.
    pub fn is_valid(&self) -> bool {
        self.default_response_tokens <= self.max_completion_tokens
            && self.max_completion_tokens <= self.context_window
    }
}

/// Immutable description of a vendor: models, endpoints, capabilities.
///
/// Built once at startup by the registry and never mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub id: ProviderId,
    /// Display name
    pub name: String,
    /// Model used when a conversation does not pick one
    pub default_model: String,
    /// Relay endpoints exposed to clients, in preference order
    pub endpoints: Vec<String>,
    /// Vendor completion API the relay forwards to
    pub upstream_url: String,
    /// Environment variables checked for an API key
    pub env: Vec<String>,
    /// API key resolved from config or environment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub models: Vec<ModelDescriptor>,
    pub capabilities: ProviderCapabilities,
}

impl ProviderDescriptor {
    /// Look up a model by id.
    pub fn model(&self, id: &str) -> Result<&ModelDescriptor> {
        self.models
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| Error::ModelNotFound {
                provider: self.id.to_string(),
                model: id.to_string(),
            })
    }
}

/// Message role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single message in the normalized (vendor-agnostic) shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Thinking-mode settings stored under the `thinking_mode` capability key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThinkingMode {
    pub enabled: bool,
    #[serde(default = "ThinkingMode::default_budget")]
    pub budget_tokens: u64,
}

impl ThinkingMode {
    fn default_budget() -> u64 {
        16000
    }
}

/// Per-conversation, mutable model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub model: String,
    pub max_tokens: u64,
    pub temperature: f64,
    pub top_p: f64,
    pub presence_penalty: f64,
    pub frequency_penalty: f64,
    /// Capability settings keyed by capability id (e.g. `thinking_mode`).
    /// Internal only, stripped before transmission.
    pub capabilities: HashMap<String, serde_json::Value>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            max_tokens: 4096,
            temperature: 1.0,
            top_p: 1.0,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
            capabilities: HashMap::new(),
        }
    }
}

impl ModelConfig {
    /// Default configuration for a specific model.
    pub fn for_model(model: &ModelDescriptor) -> Self {
        Self {
            model: model.id.clone(),
            max_tokens: model.default_response_tokens,
            ..Default::default()
        }
    }

    /// `max_tokens` clamped to what the model actually accepts.
    pub fn clamped_max_tokens(&self, model: &ModelDescriptor) -> u64 {
        self.max_tokens
            .clamp(MIN_MAX_TOKENS, model.max_completion_tokens)
    }

    /// Decode the `thinking_mode` capability settings, if present.
    pub fn thinking_mode(&self) -> Option<ThinkingMode> {
        let value = self.capabilities.get("thinking_mode")?;
        serde_json::from_value(value.clone()).ok()
    }

    /// Enable thinking mode with the given budget.
    pub fn set_thinking_mode(&mut self, enabled: bool, budget_tokens: u64) {
        let mode = ThinkingMode {
            enabled,
            budget_tokens,
        };
        self.capabilities.insert(
            "thinking_mode".to_string(),
            serde_json::to_value(mode).expect("thinking mode serializes"),
        );
    }
}

/// Vendor-agnostic request shape produced before formatting.
#[derive(Debug, Clone)]
pub struct NormalizedRequest {
    pub messages: Vec<ChatMessage>,
    pub config: ModelConfig,
    pub stream: bool,
}

/// The only shape the stream consumption engine emits upward.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedChunk {
    pub content: String,
    pub done: bool,
}

impl NormalizedChunk {
    pub fn delta(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            done: false,
        }
    }

    pub fn done() -> Self {
        Self {
            content: String::new(),
            done: true,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}
