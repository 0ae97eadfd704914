//! Provider registry: the single source of truth for vendor metadata.
//!
//! The registry is built once at process start from the static catalog plus
//! configuration overrides, and is passed by reference into every component
//! that needs provider or model metadata. No other component may hardcode
//! vendor URLs or token ceilings.

use super::types::{
    ModelCost, ModelDescriptor, ProviderCapabilities, ProviderDescriptor, ProviderId,
};
use crate::config::Config;
use crate::error::{Error, Result};

/// Immutable catalog of provider descriptors.
pub struct ProviderRegistry {
    providers: Vec<ProviderDescriptor>,
}

impl ProviderRegistry {
    /// Build the registry from the built-in catalog, without config overrides.
    pub fn new() -> Self {
        let providers = vec![Self::openai_descriptor(), Self::anthropic_descriptor()];

        for provider in &providers {
            for model in &provider.models {
                debug_assert!(model.is_valid(), "invalid catalog entry: {}", model.id);
            }
        }

        Self { providers }
    }

    /// Build the registry and apply configuration: provider filters and
    /// API keys from config or environment.
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();

        if let Some(disabled) = &config.disabled_providers {
            registry
                .providers
                .retain(|p| !disabled.contains(&p.id.to_string()));
        }

        if let Some(enabled) = &config.enabled_providers {
            registry
                .providers
                .retain(|p| enabled.contains(&p.id.to_string()));
        }

        for provider in &mut registry.providers {
            if let Some(settings) = config.provider.get(provider.id.as_str()) {
                if let Some(key) = &settings.api_key {
                    provider.key = Some(key.clone());
                }
                if let Some(base_url) = &settings.base_url {
                    provider.upstream_url = base_url.clone();
                }
            }

            // Environment overrides a configured key, matching config layering.
            for env_var in &provider.env {
                if let Ok(key) = std::env::var(env_var) {
                    if !key.is_empty() {
                        provider.key = Some(key);
                        break;
                    }
                }
            }
        }

        registry
    }

    /// Get a provider descriptor by id string.
    pub fn get(&self, id: &str) -> Result<&ProviderDescriptor> {
        self.providers
            .iter()
            .find(|p| p.id.as_str() == id)
            .ok_or_else(|| Error::ProviderNotFound(id.to_string()))
    }

    /// Get a provider descriptor by typed id.
    pub fn descriptor(&self, id: ProviderId) -> Result<&ProviderDescriptor> {
        self.get(id.as_str())
    }

    /// Get a model descriptor by provider and model id.
    pub fn get_model(&self, provider_id: &str, model_id: &str) -> Result<&ModelDescriptor> {
        self.get(provider_id)?.model(model_id)
    }

    /// Ids of all registered providers.
    pub fn available(&self) -> Vec<ProviderId> {
        self.providers.iter().map(|p| p.id).collect()
    }

    /// All registered descriptors, in registration order.
    pub fn descriptors(&self) -> &[ProviderDescriptor] {
        &self.providers
    }
}

/// Split a `provider/model` string into its parts.
pub fn parse_model_string(value: &str) -> Option<(String, String)> {
    let (provider, model) = value.split_once('/')?;
    if provider.is_empty() || model.is_empty() {
        return None;
    }
    Some((provider.to_string(), model.to_string()))
}

impl ProviderRegistry {
    fn openai_descriptor() -> ProviderDescriptor {
        ProviderDescriptor {
            id: ProviderId::OpenAi,
            name: "OpenAI".to_string(),
            default_model: "gpt-4o".to_string(),
            endpoints: vec!["/api/chat/openai".to_string()],
            upstream_url: "https://api.openai.com/v1/chat/completions".to_string(),
            env: vec!["OPENAI_API_KEY".to_string()],
            key: None,
            models: vec![
                ModelDescriptor {
                    id: "gpt-4o".to_string(),
                    name: "GPT-4o".to_string(),
                    context_window: 128_000,
                    max_completion_tokens: 16_384,
                    default_response_tokens: 4_096,
                    cost: ModelCost {
                        input: 2.5,
                        output: 10.0,
                    },
                },
                ModelDescriptor {
                    id: "gpt-4".to_string(),
                    name: "GPT-4".to_string(),
                    context_window: 8_192,
                    max_completion_tokens: 8_192,
                    default_response_tokens: 2_048,
                    cost: ModelCost {
                        input: 30.0,
                        output: 60.0,
                    },
                },
                ModelDescriptor {
                    id: "gpt-3.5-turbo".to_string(),
                    name: "GPT-3.5 Turbo".to_string(),
                    context_window: 16_385,
                    max_completion_tokens: 4_096,
                    default_response_tokens: 1_024,
                    cost: ModelCost {
                        input: 0.5,
                        output: 1.5,
                    },
                },
            ],
            capabilities: ProviderCapabilities {
                supports_thinking: false,
                supports_vision: true,
                supports_file_upload: false,
            },
        }
    }

    fn anthropic_descriptor() -> ProviderDescriptor {
        ProviderDescriptor {
            id: ProviderId::Anthropic,
            name: "Anthropic".to_string(),
            default_model: "claude-3-5-sonnet-20241022".to_string(),
            endpoints: vec!["/api/chat/anthropic".to_string()],
            upstream_url: "https://api.anthropic.com/v1/messages".to_string(),
            env: vec!["ANTHROPIC_API_KEY".to_string()],
            key: None,
            models: vec![
                ModelDescriptor {
                    id: "claude-3-5-sonnet-20241022".to_string(),
                    name: "Claude 3.5 Sonnet".to_string(),
                    context_window: 200_000,
                    max_completion_tokens: 8_192,
                    default_response_tokens: 4_096,
                    cost: ModelCost {
                        input: 3.0,
                        output: 15.0,
                    },
                },
                ModelDescriptor {
                    id: "claude-3-opus-20240229".to_string(),
                    name: "Claude 3 Opus".to_string(),
                    context_window: 200_000,
                    max_completion_tokens: 4_096,
                    default_response_tokens: 2_048,
                    cost: ModelCost {
                        input: 15.0,
                        output: 75.0,
                    },
                },
                ModelDescriptor {
                    id: "claude-3-haiku-20240307".to_string(),
                    name: "Claude 3 Haiku".to_string(),
                    context_window: 200_000,
                    max_completion_tokens: 4_096,
                    default_response_tokens: 1_024,
                    cost: ModelCost {
                        input: 0.25,
                        output: 1.25,
                    },
                },
            ],
            capabilities: ProviderCapabilities {
                supports_thinking: true,
                supports_vision: true,
                supports_file_upload: true,
            },
        }
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
