//! Capability middleware chain.
//!
//! Capabilities are tagged definitions with an applicability predicate, a
//! priority, and optional request/response transforms. The chain for a
//! `(provider, model)` pair is computed lazily, cached, and rebuilt whenever a
//! new capability registers. A failing transform is logged and skipped; one
//! broken capability never aborts a request.

use super::types::{ModelConfig, NormalizedChunk, ProviderDescriptor, ProviderId};
use crate::error::Result;
use std::collections::HashMap;
use std::sync::RwLock;

/// Context handed to every transform.
pub struct CapabilityContext<'a> {
    pub provider: &'a ProviderDescriptor,
    pub model: &'a str,
    pub config: &'a ModelConfig,
}

type RequestTransform = fn(serde_json::Value, &CapabilityContext) -> Result<serde_json::Value>;
type ResponseTransform = fn(NormalizedChunk, &CapabilityContext) -> Result<NormalizedChunk>;

/// A registered capability.
#[derive(Clone)]
pub struct CapabilityDefinition {
    pub id: &'static str,
    /// Higher priority runs first.
    pub priority: i32,
    pub applies_to: fn(&ProviderDescriptor, &str) -> bool,
    pub transform_request: Option<RequestTransform>,
    pub transform_response: Option<ResponseTransform>,
}

/// Registry of capability definitions with a memoized per-(provider, model)
/// chain. Registration is expected at startup; the cache is simply cleared
/// when it happens.
pub struct CapabilityRegistry {
    definitions: RwLock<Vec<CapabilityDefinition>>,
    cache: RwLock<HashMap<(ProviderId, String), Vec<usize>>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            definitions: RwLock::new(Vec::new()),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Registry pre-loaded with the built-in capabilities.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register(thinking_mode());
        registry
    }

    /// Register a capability and invalidate the memoized chains.
    pub fn register(&self, definition: CapabilityDefinition) {
        tracing::debug!(capability = definition.id, "registering capability");
        self.definitions
            .write()
            .expect("capability registry poisoned")
            .push(definition);
        self.cache
            .write()
            .expect("capability cache poisoned")
            .clear();
    }

    /// Indices of applicable definitions, sorted by priority (highest first).
    fn chain(&self, provider: &ProviderDescriptor, model: &str) -> Vec<usize> {
        let key = (provider.id, model.to_string());

        if let Some(chain) = self
            .cache
            .read()
            .expect("capability cache poisoned")
            .get(&key)
        {
            return chain.clone();
        }

        let definitions = self
            .definitions
            .read()
            .expect("capability registry poisoned");
        let mut chain: Vec<usize> = (0..definitions.len())
            .filter(|&i| (definitions[i].applies_to)(provider, model))
            .collect();
        chain.sort_by_key(|&i| std::cmp::Reverse(definitions[i].priority));

        self.cache
            .write()
            .expect("capability cache poisoned")
            .insert(key, chain.clone());
        chain
    }

    /// Run every applicable request transform over the wire request.
    ///
    /// Transforms produce new values; on failure the request continues
    /// unmodified by that capability.
    pub fn apply_request_middleware(
        &self,
        context: &CapabilityContext<'_>,
        request: serde_json::Value,
    ) -> serde_json::Value {
        let chain = self.chain(context.provider, context.model);
        let definitions = self
            .definitions
            .read()
            .expect("capability registry poisoned");

        let mut current = request;
        for index in chain {
            let definition = &definitions[index];
            let Some(transform) = definition.transform_request else {
                continue;
            };
            match transform(current.clone(), context) {
                Ok(next) => current = next,
                Err(e) => {
                    tracing::warn!(capability = definition.id, error = %e, "request middleware failed, skipping");
                }
            }
        }
        current
    }

    /// Symmetric reducer over parsed response chunks, in the same order.
    pub fn apply_response_middleware(
        &self,
        context: &CapabilityContext<'_>,
        chunk: NormalizedChunk,
    ) -> NormalizedChunk {
        let chain = self.chain(context.provider, context.model);
        let definitions = self
            .definitions
            .read()
            .expect("capability registry poisoned");

        let mut current = chunk;
        for index in chain {
            let definition = &definitions[index];
            let Some(transform) = definition.transform_response else {
                continue;
            };
            match transform(current.clone(), context) {
                Ok(next) => current = next,
                Err(e) => {
                    tracing::warn!(capability = definition.id, error = %e, "response middleware failed, skipping");
                }
            }
        }
        current
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Built-in thinking-mode capability.
///
/// Injects the Anthropic `thinking` block when the conversation has thinking
/// mode enabled. The budget never exceeds the request's `max_tokens`.
pub fn thinking_mode() -> CapabilityDefinition {
    CapabilityDefinition {
        id: "thinking_mode",
        priority: 10,
        applies_to: |provider, model| {
            provider.capabilities.supports_thinking && model.contains("claude")
        },
        transform_request: Some(|mut request, context| {
            let Some(mode) = context.config.thinking_mode() else {
                return Ok(request);
            };
            if !mode.enabled {
                return Ok(request);
            }

            let max_tokens = request
                .get("max_tokens")
                .and_then(|v| v.as_u64())
                .unwrap_or(mode.budget_tokens);
            let budget = mode.budget_tokens.min(max_tokens);

            request["thinking"] = serde_json::json!({
                "type": "enabled",
                "budget_tokens": budget,
            });
            Ok(request)
        }),
        transform_response: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::provider::registry::ProviderRegistry;
    use serde_json::json;

    fn tagging_capability(priority: i32, tag: &'static str) -> CapabilityDefinition {
        // Each invocation appends its tag so ordering is observable.
        fn push(mut request: serde_json::Value, tag: &str) -> serde_json::Value {
            let trail = request["trail"].as_str().unwrap_or("").to_string();
            request["trail"] = json!(format!("{trail}{tag}"));
            request
        }

        match tag {
            "a" => CapabilityDefinition {
                id: "tag_a",
                priority,
                applies_to: |_, _| true,
                transform_request: Some(|r, _| Ok(push(r, "a"))),
                transform_response: None,
            },
            _ => CapabilityDefinition {
                id: "tag_b",
                priority,
                applies_to: |_, _| true,
                transform_request: Some(|r, _| Ok(push(r, "b"))),
                transform_response: None,
            },
        }
    }

    #[test]
    fn test_priority_ordering() {
        let registry = CapabilityRegistry::new();
        registry.register(tagging_capability(1, "a"));
        registry.register(tagging_capability(5, "b"));

        let providers = ProviderRegistry::new();
        let provider = providers.get("openai").unwrap();
        let config = ModelConfig::default();
        let context = CapabilityContext {
            provider,
            model: "gpt-4o",
            config: &config,
        };

        let result = registry.apply_request_middleware(&context, json!({}));
        // Higher priority runs first.
        assert_eq!(result["trail"], "ba");
    }

    #[test]
    fn test_failing_middleware_is_skipped() {
        let registry = CapabilityRegistry::new();
        registry.register(CapabilityDefinition {
            id: "broken",
            priority: 10,
            applies_to: |_, _| true,
            transform_request: Some(|_, _| {
                Err(Error::Transport {
                    status: None,
                    message: "boom".to_string(),
                })
            }),
            transform_response: None,
        });
        registry.register(tagging_capability(1, "a"));

        let providers = ProviderRegistry::new();
        let provider = providers.get("openai").unwrap();
        let config = ModelConfig::default();
        let context = CapabilityContext {
            provider,
            model: "gpt-4o",
            config: &config,
        };

        let result = registry.apply_request_middleware(&context, json!({"x": 1}));
        assert_eq!(result["x"], 1);
        assert_eq!(result["trail"], "a");
    }

    #[test]
    fn test_cache_invalidated_on_register() {
        let registry = CapabilityRegistry::new();
        let providers = ProviderRegistry::new();
        let provider = providers.get("openai").unwrap();
        let config = ModelConfig::default();
        let context = CapabilityContext {
            provider,
            model: "gpt-4o",
            config: &config,
        };

        let before = registry.apply_request_middleware(&context, json!({}));
        assert!(before.get("trail").is_none());

        registry.register(tagging_capability(1, "a"));
        let after = registry.apply_request_middleware(&context, json!({}));
        assert_eq!(after["trail"], "a");
    }

    #[test]
    fn test_thinking_mode_injected_for_anthropic() {
        let registry = CapabilityRegistry::with_builtins();
        let providers = ProviderRegistry::new();
        let provider = providers.get("anthropic").unwrap();

        let mut config = ModelConfig::default();
        config.set_thinking_mode(true, 16_000);

        let context = CapabilityContext {
            provider,
            model: "claude-3-5-sonnet-20241022",
            config: &config,
        };

        let request = json!({"model": "claude-3-5-sonnet-20241022", "max_tokens": 8192});
        let result = registry.apply_request_middleware(&context, request);

        assert_eq!(result["thinking"]["type"], "enabled");
        // Budget is capped by max_tokens.
        assert_eq!(result["thinking"]["budget_tokens"], 8192);
    }

    #[test]
    fn test_thinking_mode_not_injected_when_disabled() {
        let registry = CapabilityRegistry::with_builtins();
        let providers = ProviderRegistry::new();
        let provider = providers.get("anthropic").unwrap();
        let config = ModelConfig::default();

        let context = CapabilityContext {
            provider,
            model: "claude-3-5-sonnet-20241022",
            config: &config,
        };

        let result = registry.apply_request_middleware(&context, json!({"max_tokens": 1000}));
        assert!(result.get("thinking").is_none());
    }

    #[test]
    fn test_thinking_mode_not_applicable_to_openai() {
        let registry = CapabilityRegistry::with_builtins();
        let providers = ProviderRegistry::new();
        let provider = providers.get("openai").unwrap();

        let mut config = ModelConfig::default();
        config.set_thinking_mode(true, 16_000);

        let context = CapabilityContext {
            provider,
            model: "gpt-4o",
            config: &config,
        };

        let result = registry.apply_request_middleware(&context, json!({"max_tokens": 1000}));
        assert!(result.get("thinking").is_none());
    }
}
