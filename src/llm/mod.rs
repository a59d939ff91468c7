//! LLM Client Layer - the action selector's backend
//!
//! This module provides:
//! - Message types for LLM communication
//! - LlmClient trait for backend abstraction
//! - OpenAiCompatClient for `/chat/completions` endpoints
//! - ScriptedLlmClient for tests and dry runs

pub mod client;
pub mod mock;
pub mod openai;
pub mod types;

pub use client::{LlmClient, LlmError};
pub use mock::{ScriptedError, ScriptedLlmClient, ScriptedReply};
pub use openai::{OpenAiCompatClient, OpenAiConfig};
pub use types::{CompletionRequest, CompletionResponse, FinishReason, Message, Role, Usage};
