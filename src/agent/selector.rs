//! Action selector: one transcript in, one decision out
//!
//! The selector imposes no policy. It renders the transcript for the
//! backend, calls it under a timeout and parses the reply.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use crate::domain::{Action, Transcript};
use crate::error::Result;
use crate::llm::{CompletionRequest, LlmClient, LlmError};
use crate::tools::ToolRegistry;

use super::parser::parse_decision;
use super::prompt::{OBSERVATION_STOP, PromptRenderer, build_messages};

/// A parsed decision plus the text it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub action: Action,
    pub raw: String,
}

/// Translates transcript state into the next decision
pub struct ActionSelector {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
    timeout: Duration,
    temperature: f32,
    max_tokens: u32,
}

impl ActionSelector {
    /// Render the system prompt for `registry` once, up front
    pub fn new(
        llm: Arc<dyn LlmClient>,
        registry: &ToolRegistry,
        renderer: &PromptRenderer,
        max_iterations: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let system_prompt = renderer.render_system(registry.list(None), max_iterations)?;
        Ok(Self {
            llm,
            system_prompt,
            timeout,
            temperature: 0.0,
            max_tokens: 2048,
        })
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    /// The request `decide` would send for this transcript
    pub fn build_request(&self, transcript: &Transcript) -> CompletionRequest {
        let mut request = CompletionRequest::new(self.system_prompt.as_str())
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
            .with_stop(OBSERVATION_STOP);
        request.messages = build_messages(transcript);
        request
    }

    /// Ask the backend for the next decision.
    ///
    /// Only transport failures are errors. A reply the backend delivered but
    /// that carries nothing usable becomes `Action::Malformed`, so the loop
    /// can ask again.
    pub async fn decide(&self, transcript: &Transcript) -> std::result::Result<Decision, LlmError> {
        let request = self.build_request(transcript);

        let response = match tokio::time::timeout(self.timeout, self.llm.complete(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(LlmError::InvalidResponse(reason))) => {
                warn!("Unusable reply from {} for {}: {}", self.llm.model(), transcript.task().id, reason);
                return Ok(Decision {
                    action: Action::Malformed {
                        reason: format!("the reply could not be read ({})", reason),
                    },
                    raw: String::new(),
                });
            }
            Ok(Err(err)) => return Err(err),
            Err(_) => return Err(LlmError::Timeout(self.timeout)),
        };

        debug!(
            "Selector reply from {} for {} ({} tokens): {}",
            self.llm.model(),
            transcript.task().id,
            response.usage.total(),
            response.content.trim()
        );

        Ok(Decision {
            action: parse_decision(&response.content),
            raw: response.content,
        })
    }
}
