//! Per-vendor response parsers.
//!
//! Parsers absorb everything vendor-specific and emit the normalized chunk
//! shape. Known shapes are matched exhaustively through tagged deserialization;
//! anything else lands in an explicit `Unrecognized` branch which normalizes to
//! an empty, non-terminal chunk. A malformed chunk is never allowed to abort a
//! stream.

use super::types::{NormalizedChunk, ProviderId};
use serde::Deserialize;

/// Internal classification of a vendor payload.
///
/// `Empty` is a well-formed chunk that carries no text (e.g. a ping or a
/// thinking delta); `Unrecognized` is a shape the parser does not know.
/// Both normalize to the same externally visible chunk, the distinction
/// exists for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedChunk {
    Text(String),
    Done,
    Empty,
    Unrecognized,
}

impl ParsedChunk {
    /// Collapse into the normalized shape the engine emits upward.
    pub fn into_normalized(self) -> NormalizedChunk {
        match self {
            ParsedChunk::Text(content) => NormalizedChunk::delta(content),
            ParsedChunk::Done => NormalizedChunk::done(),
            ParsedChunk::Empty | ParsedChunk::Unrecognized => NormalizedChunk::empty(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    #[serde(default)]
    delta: Option<OpenAiContent>,
    #[serde(default)]
    message: Option<OpenAiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiContent {
    #[serde(default)]
    content: Option<String>,
}

/// Anthropic SSE events and the full (non-streamed) message object share the
/// same `type` tag.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum AnthropicEvent {
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { delta: AnthropicDelta },
    #[serde(rename = "content_block_start")]
    ContentBlockStart,
    #[serde(rename = "content_block_stop")]
    ContentBlockStop,
    #[serde(rename = "message_start")]
    MessageStart,
    #[serde(rename = "message_delta")]
    MessageDelta {
        #[serde(default)]
        delta: Option<AnthropicStopDelta>,
    },
    #[serde(rename = "message_stop")]
    MessageStop,
    #[serde(rename = "message")]
    Message { content: Vec<AnthropicBlock> },
    #[serde(rename = "ping")]
    Ping,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum AnthropicDelta {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    #[serde(rename = "thinking_delta")]
    ThinkingDelta,
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicStopDelta {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum AnthropicBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

/// Classify a vendor payload for the given provider.
pub fn parse_vendor(provider: ProviderId, value: &serde_json::Value) -> ParsedChunk {
    match provider {
        ProviderId::OpenAi => parse_openai(value),
        ProviderId::Anthropic => parse_anthropic(value),
    }
}

/// Parse a vendor payload into the normalized chunk shape.
///
/// Handles full completion objects, OpenAI delta chunks and Anthropic delta
/// chunks. Unrecognized payloads parse to an empty, non-terminal chunk.
pub fn parse_chunk(provider: ProviderId, value: &serde_json::Value) -> NormalizedChunk {
    let parsed = parse_vendor(provider, value);
    if parsed == ParsedChunk::Unrecognized {
        tracing::debug!(provider = %provider, "skipping unrecognized response chunk");
    }
    parsed.into_normalized()
}

/// Extract the text of a full, non-streamed completion. `None` when the
/// response carries no recognizable content.
pub fn parse_completion(provider: ProviderId, value: &serde_json::Value) -> Option<String> {
    match provider {
        ProviderId::OpenAi => {
            let response: OpenAiResponse = serde_json::from_value(value.clone()).ok()?;
            response
                .choices
                .into_iter()
                .next()?
                .message
                .and_then(|m| m.content)
        }
        ProviderId::Anthropic => {
            let event: AnthropicEvent = serde_json::from_value(value.clone()).ok()?;
            match event {
                AnthropicEvent::Message { content } => content.into_iter().find_map(|b| match b {
                    AnthropicBlock::Text { text } => Some(text),
                    AnthropicBlock::Other => None,
                }),
                _ => None,
            }
        }
    }
}

fn parse_openai(value: &serde_json::Value) -> ParsedChunk {
    let Ok(response) = serde_json::from_value::<OpenAiResponse>(value.clone()) else {
        return ParsedChunk::Unrecognized;
    };
    let Some(choice) = response.choices.into_iter().next() else {
        return ParsedChunk::Empty;
    };

    // Streamed delta takes precedence; a full message object means the whole
    // completion arrived in one piece.
    if let Some(delta) = choice.delta {
        if let Some(content) = delta.content {
            return ParsedChunk::Text(content);
        }
        if choice.finish_reason.is_some() {
            return ParsedChunk::Done;
        }
        return ParsedChunk::Empty;
    }

    if let Some(message) = choice.message {
        if let Some(content) = message.content {
            return ParsedChunk::Text(content);
        }
    }

    if choice.finish_reason.is_some() {
        return ParsedChunk::Done;
    }

    ParsedChunk::Unrecognized
}

fn parse_anthropic(value: &serde_json::Value) -> ParsedChunk {
    let Ok(event) = serde_json::from_value::<AnthropicEvent>(value.clone()) else {
        return ParsedChunk::Unrecognized;
    };

    match event {
        AnthropicEvent::ContentBlockDelta { delta } => match delta {
            AnthropicDelta::TextDelta { text } => ParsedChunk::Text(text),
            AnthropicDelta::ThinkingDelta | AnthropicDelta::Other => ParsedChunk::Empty,
        },
        AnthropicEvent::MessageDelta { delta } => {
            match delta.and_then(|d| d.stop_reason) {
                Some(_) => ParsedChunk::Done,
                None => ParsedChunk::Empty,
            }
        }
        AnthropicEvent::MessageStop => ParsedChunk::Done,
        AnthropicEvent::Message { content } => content
            .into_iter()
            .find_map(|b| match b {
                AnthropicBlock::Text { text } => Some(ParsedChunk::Text(text)),
                AnthropicBlock::Other => None,
            })
            .unwrap_or(ParsedChunk::Empty),
        AnthropicEvent::ContentBlockStart
        | AnthropicEvent::ContentBlockStop
        | AnthropicEvent::MessageStart
        | AnthropicEvent::Ping => ParsedChunk::Empty,
        AnthropicEvent::Unknown => ParsedChunk::Unrecognized,
    }
}
