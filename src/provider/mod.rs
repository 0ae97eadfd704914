//! Provider abstraction: registry, wire formatting, response parsing,
//! capability middleware and the stream consumption engine.

pub mod capability;
pub mod format;
pub mod parse;
pub mod registry;
pub mod streaming;
pub mod types;

pub use capability::{CapabilityContext, CapabilityDefinition, CapabilityRegistry};
pub use format::format_request;
pub use parse::{parse_chunk, parse_completion, ParsedChunk};
pub use registry::{parse_model_string, ProviderRegistry};
pub use streaming::{ChatStreamHandler, SseDecoder, SseFrame, StreamOutcome};
pub use types::{
    ChatMessage, ModelConfig, ModelDescriptor, NormalizedChunk, NormalizedRequest,
    ProviderCapabilities, ProviderDescriptor, ProviderId, Role, ThinkingMode,
};
