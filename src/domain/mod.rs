//! Domain types for answerloop
//!
//! This module contains the data model of a run:
//! - Task: the immutable question being answered
//! - Transcript / Step: the append-only record of one run
//! - ToolResult: the uniform envelope around a tool attempt
//! - RunOutcome: what a caller gets back

pub mod outcome;
pub mod task;
pub mod tool_result;
pub mod transcript;

pub use outcome::{FailureCause, FailureStage, NO_ANSWER, RunOutcome};
pub use task::Task;
pub use tool_result::{ToolFailure, ToolFailureKind, ToolResult};
pub use transcript::{Action, Observation, RunStatus, Step, Transcript};
