//! Run outcome types.
//!
//! A caller always gets a `RunOutcome` back, never a bare error.

use serde::{Deserialize, Serialize};

use super::transcript::{RunStatus, Step};
use crate::error::ErrorKind;

/// Sentinel answer for a run that never produced a candidate
pub const NO_ANSWER: &str = "Unable to determine answer";

/// Where a fatal error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// No decision could be obtained from the backend
    ActionSelector,
    /// Cancelled by the caller or the run deadline
    Cancellation,
}

/// Diagnosis attached to a failed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCause {
    pub stage: FailureStage,
    pub kind: ErrorKind,
    /// Attempts made on the stage before giving up
    pub attempts: u32,
    /// Kind of the last underlying error, e.g. "timeout" or "rate_limited"
    pub last_error: String,
    pub message: String,
}

/// Result of `Agent::run`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub task_id: String,
    pub status: RunStatus,
    /// Validated when `Answered`, best-effort when `Exhausted`
    pub answer: Option<String>,
    pub steps: Vec<Step>,
    pub iterations: u32,
    pub elapsed_ms: u64,
    pub failure: Option<FailureCause>,
}

impl RunOutcome {
    /// True only for answers that passed normalization
    pub fn is_validated(&self) -> bool {
        self.status == RunStatus::Answered && self.answer.is_some()
    }

    /// Answer text for submission; falls back to the sentinel
    pub fn answer_or_sentinel(&self) -> &str {
        self.answer.as_deref().unwrap_or(NO_ANSWER)
    }
}
