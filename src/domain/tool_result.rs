//! Tool results: the uniform envelope every tool invocation produces

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// Why a tool invocation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolFailureKind {
    /// Arguments did not match the input schema; the tool was never called
    InvalidArguments,
    /// The call exceeded its wall-clock budget
    Timeout,
    /// Network or upstream API failure
    ExternalServiceError,
    /// Unexpected failure inside the tool's own logic
    ToolInternalError,
}

impl ToolFailureKind {
    /// Transient failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::ExternalServiceError)
    }
}

impl From<ToolFailureKind> for ErrorKind {
    fn from(kind: ToolFailureKind) -> Self {
        match kind {
            ToolFailureKind::InvalidArguments => ErrorKind::InvalidArguments,
            ToolFailureKind::Timeout => ErrorKind::Timeout,
            ToolFailureKind::ExternalServiceError => ErrorKind::ExternalServiceError,
            ToolFailureKind::ToolInternalError => ErrorKind::ToolInternalError,
        }
    }
}

/// A classified tool failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub kind: ToolFailureKind,
    pub message: String,
}

impl ToolFailure {
    pub fn new(kind: ToolFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::new(ToolFailureKind::InvalidArguments, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ToolFailureKind::Timeout, message)
    }

    pub fn external(message: impl Into<String>) -> Self {
        Self::new(ToolFailureKind::ExternalServiceError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ToolFailureKind::ToolInternalError, message)
    }
}

impl std::fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", ErrorKind::from(self.kind), self.message)
    }
}

impl std::error::Error for ToolFailure {}

impl From<reqwest::Error> for ToolFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(err.to_string())
        } else {
            Self::external(err.to_string())
        }
    }
}

/// Outcome of one tool attempt. Never mutated once produced; a retry
/// produces a new `ToolResult`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResult {
    Success { output: String },
    Failure { failure: ToolFailure },
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self::Success { output: output.into() }
    }

    pub fn failure(failure: ToolFailure) -> Self {
        Self::Failure { failure }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn failure_kind(&self) -> Option<ToolFailureKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { failure } => Some(failure.kind),
        }
    }

    pub fn into_result(self) -> Result<String, ToolFailure> {
        match self {
            Self::Success { output } => Ok(output),
            Self::Failure { failure } => Err(failure),
        }
    }

    /// Text shown to the model as the observation
    pub fn observation_text(&self) -> String {
        match self {
            Self::Success { output } => output.clone(),
            Self::Failure { failure } => format!("Tool error ({}): {}", ErrorKind::from(failure.kind), failure.message),
        }
    }
}

impl From<Result<String, ToolFailure>> for ToolResult {
    fn from(result: Result<String, ToolFailure>) -> Self {
        match result {
            Ok(output) => Self::success(output),
            Err(failure) => Self::failure(failure),
        }
    }
}
