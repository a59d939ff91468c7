//! Error types for answerloop
//!
//! Two layers live here: `AgentError` for failures of the crate's own
//! plumbing (registry setup, I/O, serialization), and `ErrorKind`, the
//! classification attached to every recoverable or terminal condition the
//! reasoning loop records in a transcript.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All error types that can escape answerloop's APIs
#[derive(Debug, Error)]
pub enum AgentError {
    /// A tool with the same name was already registered
    #[error("Duplicate tool: {0}")]
    DuplicateTool(String),

    /// Lookup of a tool that is not in the registry
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Tool execution error
    #[error("Tool error: {0}")]
    Tool(String),

    /// Prompt template failed to compile or render
    #[error("Template error: {0}")]
    Template(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for answerloop operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Classification of everything that can go wrong inside a run.
///
/// Only `SelectorUnavailable` and `Cancelled` end a run as failed; every
/// other kind is turned into an observation the model can react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidArguments,
    Timeout,
    ExternalServiceError,
    ToolInternalError,
    UnknownTool,
    MalformedAction,
    Unnormalizable,
    BudgetExhausted,
    SelectorUnavailable,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArguments => "invalid_arguments",
            Self::Timeout => "timeout",
            Self::ExternalServiceError => "external_service_error",
            Self::ToolInternalError => "tool_internal_error",
            Self::UnknownTool => "unknown_tool",
            Self::MalformedAction => "malformed_action",
            Self::Unnormalizable => "unnormalizable",
            Self::BudgetExhausted => "budget_exhausted",
            Self::SelectorUnavailable => "selector_unavailable",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
