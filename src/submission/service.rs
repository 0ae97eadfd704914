//! Submission orchestration.
//!
//! Ties the pipeline together for one chat turn: lock, format, capability
//! middleware, relay request, stream consumption. The state machine is
//! advanced at every phase boundary so observers can render progress.

use super::lock::SubmissionLock;
use super::state::{SubmissionAction, SubmissionState};
use crate::config::TimeoutConfig;
use crate::error::{Error, Result};
use crate::provider::{
    format_request, CapabilityContext, CapabilityRegistry, ChatStreamHandler, NormalizedRequest,
    ProviderRegistry, StreamOutcome,
};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Result of one submission: the assistant content accumulated so far and
/// whether the stream ran to completion or was aborted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionOutcome {
    pub content: String,
    pub outcome: StreamOutcome,
}

pub struct SubmissionService {
    registry: Arc<ProviderRegistry>,
    capabilities: Arc<CapabilityRegistry>,
    client: reqwest::Client,
    /// Relay base URL, e.g. `http://127.0.0.1:19876`.
    base_url: String,
    timeouts: TimeoutConfig,
    lock: SubmissionLock,
    state: Mutex<SubmissionState>,
}

impl SubmissionService {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        capabilities: Arc<CapabilityRegistry>,
        base_url: impl Into<String>,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            registry,
            capabilities,
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            timeouts,
            lock: SubmissionLock::new(),
            state: Mutex::new(SubmissionState::new()),
        }
    }

    /// Snapshot of the current lifecycle state.
    pub fn state(&self) -> SubmissionState {
        self.state.lock().expect("submission state poisoned").clone()
    }

    fn dispatch(&self, action: SubmissionAction) {
        self.state
            .lock()
            .expect("submission state poisoned")
            .apply(action);
    }

    /// Run one chat turn against the relay, invoking `on_content` for each
    /// streamed delta in arrival order.
    ///
    /// Only one submission may be in flight; a second call while active fails
    /// with [`Error::SubmissionInProgress`] without touching the network.
    /// Cancelling the token stops the stream and returns the partial content.
    pub async fn submit<F>(
        &self,
        provider_id: &str,
        request: &NormalizedRequest,
        cancel: CancellationToken,
        on_content: F,
    ) -> Result<SubmissionOutcome>
    where
        F: FnMut(&str),
    {
        if !self.lock.lock() {
            return Err(Error::SubmissionInProgress);
        }
        self.dispatch(SubmissionAction::SubmitStart);

        let result = self.submit_locked(provider_id, request, cancel, on_content).await;

        match &result {
            Ok(outcome) if outcome.outcome == StreamOutcome::Aborted => {
                self.dispatch(SubmissionAction::Abort);
            }
            Ok(_) => self.dispatch(SubmissionAction::Complete),
            Err(e) => self.dispatch(SubmissionAction::Error(e.to_string())),
        }
        self.lock.unlock();
        result
    }

    async fn submit_locked<F>(
        &self,
        provider_id: &str,
        request: &NormalizedRequest,
        cancel: CancellationToken,
        mut on_content: F,
    ) -> Result<SubmissionOutcome>
    where
        F: FnMut(&str),
    {
        let descriptor = self.registry.get(provider_id)?;

        let mut formatted = format_request(descriptor, request)?;
        let context = CapabilityContext {
            provider: descriptor,
            model: &request.config.model,
            config: &request.config,
        };
        formatted = self.capabilities.apply_request_middleware(&context, formatted);

        // The relay injects the real key; a key configured locally rides
        // along flat in the body and wins server-side.
        if let Some(key) = &descriptor.key {
            formatted["apiKey"] = serde_json::Value::String(key.clone());
        }

        let endpoint = descriptor
            .endpoints
            .first()
            .ok_or_else(|| Error::ProviderNotFound(provider_id.to_string()))?;
        let url = format!("{}{}", self.base_url, endpoint);

        self.dispatch(SubmissionAction::Submitting);
        tracing::debug!(provider = provider_id, url = %url, "submitting chat request");

        let response = self
            .client
            .post(&url)
            .timeout(self.timeouts.completion_ceiling())
            .json(&formatted)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
                .unwrap_or_else(|| format!("HTTP error {status}"));
            return Err(Error::Transport {
                status: Some(status),
                message,
            });
        }

        self.dispatch(SubmissionAction::Streaming);

        let handler = ChatStreamHandler::new(descriptor.id, cancel);
        let mut content = String::new();
        let outcome = handler
            .process_stream(response.bytes_stream(), |delta| {
                content.push_str(delta);
                on_content(delta);
            })
            .await?;

        self.dispatch(SubmissionAction::StreamComplete);
        Ok(SubmissionOutcome { content, outcome })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::provider::{ChatMessage, ModelConfig, Role};

    fn test_service() -> SubmissionService {
        SubmissionService::new(
            Arc::new(ProviderRegistry::new()),
            Arc::new(CapabilityRegistry::with_builtins()),
            "http://127.0.0.1:1",
            Config::default().timeouts,
        )
    }

    fn test_request() -> NormalizedRequest {
        let mut config = ModelConfig::default();
        config.model = "gpt-4o".to_string();
        NormalizedRequest {
            messages: vec![ChatMessage::new(Role::User, "hello")],
            config,
            stream: true,
        }
    }

    #[tokio::test]
    async fn test_second_submission_is_rejected_without_network() {
        let service = test_service();
        // Hold the lock as if a submission were active.
        assert!(service.lock.lock());

        let err = service
            .submit("openai", &test_request(), CancellationToken::new(), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SubmissionInProgress));
    }

    #[tokio::test]
    async fn test_unknown_provider_fails_and_releases_lock() {
        let service = test_service();
        let err = service
            .submit("mistral", &test_request(), CancellationToken::new(), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProviderNotFound(_)));

        // Lock must be free again and the state machine in error.
        assert!(!service.lock.is_active());
        assert!(service.state().is_error());
    }

    #[tokio::test]
    async fn test_transport_failure_surfaces_as_error_state() {
        // Nothing listens on port 1, so the request itself fails.
        let service = test_service();
        let result = service
            .submit("openai", &test_request(), CancellationToken::new(), |_| {})
            .await;
        assert!(result.is_err());
        assert!(service.state().is_error());
        assert!(!service.lock.is_active());
    }
}
