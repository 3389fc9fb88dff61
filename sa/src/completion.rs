//! Completion Provider - the prompt-in, text-out boundary used by the assistant
//!
//! Every LLM use in the assistant (planning, table selection, query generation,
//! URL extraction, output formatting) goes through [`CompletionProvider`].
//! Failures come back as classified [`CompletionError`] values.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::context::Turn;
use crate::llm::{CompletionRequest, LlmClient, LlmError, Message, Role};

/// A successful completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    /// Total tokens billed for the call, when the provider reports it
    pub usage_tokens: Option<u64>,
}

impl Completion {
    pub fn new(text: impl Into<String>, usage_tokens: Option<u64>) -> Self {
        Self {
            text: text.into(),
            usage_tokens,
        }
    }
}

/// Classified completion failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompletionError {
    /// The provider rejected the request itself (bad input, content filter)
    #[error("{0}")]
    MalformedRequest(String),

    /// The provider could not be reached
    #[error("{0}")]
    Connectivity(String),

    /// Any other provider-side failure
    #[error("{0}")]
    Service(String),
}

impl From<LlmError> for CompletionError {
    fn from(err: LlmError) -> Self {
        if err.is_client_error() {
            let message = match err {
                LlmError::ApiError { message, .. } => message,
                other => other.to_string(),
            };
            CompletionError::MalformedRequest(message)
        } else if err.is_connectivity() {
            CompletionError::Connectivity(err.to_string())
        } else {
            CompletionError::Service(err.to_string())
        }
    }
}

pub type CompletionResult = Result<Completion, CompletionError>;

/// Stateless text completion with usage accounting
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Complete `prompt` after the given prior turns
    ///
    /// A leading system turn in `prior` replaces the provider's default system message.
    async fn complete(&self, prompt: &str, prior: &[Turn]) -> CompletionResult;
}

/// Adapts an [`LlmClient`] to the completion boundary
pub struct LlmCompletionProvider {
    client: Arc<dyn LlmClient>,
    default_system: String,
    max_tokens: u32,
}

impl LlmCompletionProvider {
    pub fn new(client: Arc<dyn LlmClient>, default_system: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            client,
            default_system: default_system.into(),
            max_tokens,
        }
    }

    fn build_request(&self, prompt: &str, prior: &[Turn]) -> CompletionRequest {
        let (system_prompt, rest) = match prior.split_first() {
            Some((first, rest)) if first.role == Role::System => (first.content.clone(), rest),
            _ => (self.default_system.clone(), prior),
        };

        let mut messages: Vec<Message> = rest.iter().map(Message::from).collect();
        messages.push(Message::user(prompt));

        CompletionRequest {
            system_prompt,
            messages,
            max_tokens: self.max_tokens,
        }
    }
}

#[async_trait]
impl CompletionProvider for LlmCompletionProvider {
    async fn complete(&self, prompt: &str, prior: &[Turn]) -> CompletionResult {
        debug!(prompt_len = prompt.len(), prior = prior.len(), "LlmCompletionProvider::complete: called");
        let request = self.build_request(prompt, prior);

        let response = self.client.complete(request).await.map_err(|e| {
            warn!(error = %e, "LlmCompletionProvider::complete: request failed");
            CompletionError::from(e)
        })?;

        let text = response
            .content
            .ok_or_else(|| CompletionError::Service(format!("No content in response ({:?})", response.stop_reason)))?;

        Ok(Completion::new(text, Some(response.usage.total())))
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// One recorded call
    #[derive(Debug, Clone)]
    pub struct RecordedCall {
        pub prompt: String,
        pub prior: Vec<Turn>,
    }

    /// Scripted completion provider that records every prompt and prior-turn list
    pub struct ScriptedCompletions {
        responses: Mutex<Vec<CompletionResult>>,
        calls: Mutex<Vec<RecordedCall>>,
    }

    impl ScriptedCompletions {
        pub fn new(responses: Vec<CompletionResult>) -> Self {
            let mut responses = responses;
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Shorthand for a script of successful texts
        pub fn texts(texts: &[&str]) -> Self {
            Self::new(texts.iter().map(|t| Ok(Completion::new(*t, Some(10)))).collect())
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedCompletions {
        async fn complete(&self, prompt: &str, prior: &[Turn]) -> CompletionResult {
            self.calls.lock().unwrap().push(RecordedCall {
                prompt: prompt.to_string(),
                prior: prior.to_vec(),
            });
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(CompletionError::Service("No more scripted completions".to_string())))
        }
    }
}
