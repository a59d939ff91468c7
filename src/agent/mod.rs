//! The reasoning agent
//!
//! - `runner`: the loop that drives a task to a terminal status
//! - `selector`: transcript in, decision out
//! - `parser`: backend text to `Action`
//! - `prompt`: system prompt and message history
//! - `normalizer`: canonical form of a final answer
//! - `retry`: backoff and error classification for both call paths

pub mod normalizer;
pub mod parser;
pub mod prompt;
pub mod retry;
pub mod runner;
pub mod selector;

pub use normalizer::{NormalizeError, normalize};
pub use parser::parse_decision;
pub use prompt::PromptRenderer;
pub use retry::{RetryError, RetryPolicy, RetryReport, Retryable, retry};
pub use runner::{Agent, AgentSettings};
pub use selector::{ActionSelector, Decision};
