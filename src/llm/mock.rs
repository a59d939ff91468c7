//! Scripted LLM client for tests and dry runs
//!
//! Replies are consumed in order. Once the script runs out, the last reply
//! is repeated, so "always fails" only needs a single scripted error.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::client::{LlmClient, LlmError};
use crate::llm::types::{CompletionRequest, CompletionResponse};

/// One scripted reply
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    Error(ScriptedError),
    /// Sleep before answering, to exercise selector timeouts
    Delayed(Duration, String),
}

/// Cloneable stand-in for `LlmError`
#[derive(Debug, Clone)]
pub enum ScriptedError {
    Timeout,
    RateLimited,
    Server(u16),
    Client(u16),
    InvalidResponse,
}

impl ScriptedError {
    fn to_error(&self) -> LlmError {
        match self {
            ScriptedError::Timeout => LlmError::Timeout(Duration::from_secs(1)),
            ScriptedError::RateLimited => LlmError::RateLimited {
                retry_after: Duration::from_millis(10),
            },
            ScriptedError::Server(status) | ScriptedError::Client(status) => LlmError::ApiError {
                status: *status,
                message: "scripted".to_string(),
            },
            ScriptedError::InvalidResponse => LlmError::InvalidResponse("scripted".to_string()),
        }
    }
}

/// LLM client that replays a fixed script and records every request
pub struct ScriptedLlmClient {
    script: Mutex<VecDeque<ScriptedReply>>,
    last: Mutex<Option<ScriptedReply>>,
    requests: Mutex<Vec<CompletionRequest>>,
    calls: AtomicU32,
}

impl ScriptedLlmClient {
    pub fn new(script: Vec<ScriptedReply>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
        }
    }

    /// Script made only of text replies
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(|t| ScriptedReply::Text(t.into())).collect())
    }

    /// Client whose every call fails with the given error
    pub fn always_failing(error: ScriptedError) -> Self {
        Self::new(vec![ScriptedReply::Error(error)])
    }

    /// Number of `complete` calls made so far
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Copies of every request received
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn next_reply(&self) -> Option<ScriptedReply> {
        let next = self.script.lock().ok()?.pop_front();
        let mut last = self.last.lock().ok()?;
        match next {
            Some(reply) => {
                *last = Some(reply.clone());
                Some(reply)
            }
            None => last.clone(),
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        match self.next_reply() {
            Some(ScriptedReply::Text(text)) => Ok(CompletionResponse::text(text)),
            Some(ScriptedReply::Error(error)) => Err(error.to_error()),
            Some(ScriptedReply::Delayed(delay, text)) => {
                tokio::time::sleep(delay).await;
                Ok(CompletionResponse::text(text))
            }
            None => Err(LlmError::InvalidResponse("script is empty".to_string())),
        }
    }

    fn model(&self) -> &str {
        "scripted"
    }
}
