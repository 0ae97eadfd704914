//! Per-vendor request formatters.
//!
//! A formatter maps the normalized request shape into the vendor's wire
//! schema. Internal-only fields (`capabilities`, provider metadata, API keys)
//! never survive formatting, `max_tokens` is clamped to what the model
//! accepts, and `stream` is always set explicitly.

use super::types::{NormalizedRequest, ProviderDescriptor, ProviderId, Role};
use crate::error::Result;
use serde::Serialize;

/// Message in the OpenAI chat schema. Anthropic reuses the same shape for
/// its `messages` array once the system message has been lifted out.
#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct OpenAiWireRequest<'a> {
    model: &'a str,
    max_tokens: u64,
    temperature: f64,
    top_p: f64,
    presence_penalty: f64,
    frequency_penalty: f64,
    stream: bool,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicWireRequest<'a> {
    model: &'a str,
    max_tokens: u64,
    temperature: f64,
    top_p: f64,
    stream: bool,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
}

/// Format a normalized request into the provider's wire schema.
///
/// The result is a plain JSON value so capability middleware can transform it
/// without knowing the vendor-specific struct.
pub fn format_request(
    provider: &ProviderDescriptor,
    request: &NormalizedRequest,
) -> Result<serde_json::Value> {
    let model = provider.model(&request.config.model)?;
    let max_tokens = request.config.clamped_max_tokens(model);

    // Messages with no content are dropped before transmission.
    let messages: Vec<_> = request
        .messages
        .iter()
        .filter(|m| !m.content.trim().is_empty())
        .collect();

    let value = match provider.id {
        ProviderId::OpenAi => {
            let wire = OpenAiWireRequest {
                model: &model.id,
                max_tokens,
                temperature: request.config.temperature,
                top_p: request.config.top_p,
                presence_penalty: request.config.presence_penalty,
                frequency_penalty: request.config.frequency_penalty,
                stream: request.stream,
                messages: messages
                    .iter()
                    .map(|m| WireMessage {
                        role: m.role.as_str(),
                        content: &m.content,
                    })
                    .collect(),
            };
            serde_json::to_value(wire)?
        }
        ProviderId::Anthropic => {
            // Anthropic disallows the system role inside the messages array;
            // the first system message becomes the top-level `system` field.
            let system = messages
                .iter()
                .find(|m| m.role == Role::System)
                .map(|m| m.content.as_str());

            let wire = AnthropicWireRequest {
                model: &model.id,
                max_tokens,
                temperature: request.config.temperature,
                top_p: request.config.top_p,
                stream: request.stream,
                messages: messages
                    .iter()
                    .filter(|m| m.role != Role::System)
                    .map(|m| WireMessage {
                        role: match m.role {
                            Role::Assistant => "assistant",
                            _ => "user",
                        },
                        content: &m.content,
                    })
                    .collect(),
                system,
            };
            serde_json::to_value(wire)?
        }
    };

    Ok(value)
}
