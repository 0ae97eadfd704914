//! Prompt command - runs a single chat turn against the relay.

use crate::config::Config;
use crate::provider::{
    parse_model_string, CapabilityRegistry, ChatMessage, ModelConfig, NormalizedRequest,
    ProviderRegistry, Role,
};
use crate::session::Conversation;
use crate::storage::{Storage, StorageConfig};
use crate::submission::SubmissionService;
use crate::title::{RelayCompletionBackend, TitleGenerator};
use anyhow::Result;
use std::io::Write;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Execute a single prompt: stream the reply to stdout, then persist the
/// conversation.
pub async fn execute(prompt: &str, model: Option<&str>, format: &str) -> Result<()> {
    let config = Config::load().await?;
    let registry = Arc::new(ProviderRegistry::from_config(&config));
    let capabilities = Arc::new(CapabilityRegistry::with_builtins());

    let (provider_id, model_id) = resolve_model(model, &config, &registry)?;
    let model_descriptor = registry.get_model(&provider_id, &model_id)?;
    let model_config = ModelConfig::for_model(model_descriptor);

    let base_url = format!("http://{}:{}", config.server.hostname, config.server.port);
    let service = SubmissionService::new(
        registry.clone(),
        capabilities,
        base_url.clone(),
        config.timeouts,
    );

    let mut conversation = Conversation::new(model_config.clone());
    conversation.push(ChatMessage::new(Role::User, prompt));

    let request = NormalizedRequest {
        messages: conversation.messages.clone(),
        config: model_config,
        stream: true,
    };

    // Ctrl-C aborts the stream; partial content is kept.
    let cancel = CancellationToken::new();
    let abort = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            abort.cancel();
        }
    });

    let text_output = format == "text";
    let outcome = service
        .submit(&provider_id, &request, cancel, |delta| {
            if text_output {
                print!("{}", delta);
                let _ = std::io::stdout().flush();
            }
        })
        .await?;

    if text_output {
        println!();
    }

    conversation.push(ChatMessage::new(Role::Assistant, outcome.content.clone()));

    let backend = Arc::new(RelayCompletionBackend::new(
        registry,
        base_url,
        config.timeouts,
    ));
    TitleGenerator::new(backend, &provider_id)
        .maybe_generate(&mut conversation)
        .await;

    let storage = Storage::new(StorageConfig::from_settings(&config.storage));
    storage
        .write(&["conversations", &conversation.id], &conversation)
        .await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&conversation)?);
    }

    Ok(())
}

/// Model resolution priority: CLI flag, then config, then the provider's
/// default model.
fn resolve_model(
    model: Option<&str>,
    config: &Config,
    registry: &ProviderRegistry,
) -> Result<(String, String)> {
    if let Some(m) = model {
        return parse_model_string(m)
            .ok_or_else(|| anyhow::anyhow!("Invalid model format. Use 'provider/model'"));
    }

    if let Some(configured) = config.model.as_ref() {
        return parse_model_string(configured)
            .ok_or_else(|| anyhow::anyhow!("Invalid model format in config"));
    }

    let descriptor = registry
        .descriptors()
        .first()
        .ok_or_else(|| anyhow::anyhow!("No providers enabled"))?;
    Ok((
        descriptor.id.to_string(),
        descriptor.default_model.clone(),
    ))
}
