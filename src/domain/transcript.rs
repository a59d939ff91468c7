//! Transcript: the mutable state of one run
//!
//! A transcript is owned by exactly one reasoning loop. Steps can only be
//! appended, and the status can only leave `Running` once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use super::task::Task;
use super::tool_result::ToolResult;
use crate::error::ErrorKind;

/// Status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Still deciding and acting
    Running,
    /// A final answer passed normalization
    Answered,
    /// The iteration budget ran out
    Exhausted,
    /// A fatal error stopped the run
    Failed,
}

impl RunStatus {
    /// Returns true if the run has ended
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Running => "running",
            RunStatus::Answered => "answered",
            RunStatus::Exhausted => "exhausted",
            RunStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What the agent decided to do in one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    ToolCall { name: String, arguments: Value },
    FinalAnswer { text: String },
    Malformed { reason: String },
}

/// What came back from an action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Observation {
    /// Every attempt made for one tool call, oldest first
    Tool { attempts: Vec<ToolResult> },
    /// Synthetic feedback for an action the loop refused
    Rejected { kind: ErrorKind, message: String },
    /// The normalized final answer
    Accepted { answer: String },
}

impl Observation {
    /// The result that counts for a tool observation
    pub fn final_tool_result(&self) -> Option<&ToolResult> {
        match self {
            Observation::Tool { attempts } => attempts.last(),
            _ => None,
        }
    }

    /// Text fed back to the model
    pub fn to_prompt_text(&self) -> String {
        match self {
            Observation::Tool { attempts } => match attempts.last() {
                Some(result) if attempts.len() > 1 => {
                    format!("{} (after {} attempts)", result.observation_text(), attempts.len())
                }
                Some(result) => result.observation_text(),
                None => "Tool produced no result".to_string(),
            },
            Observation::Rejected { message, .. } => message.clone(),
            Observation::Accepted { answer } => format!("Answer accepted: {}", answer),
        }
    }
}

/// One iteration's record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Zero-based position in the transcript
    pub index: u32,
    pub action: Action,
    pub observation: Observation,
    /// Raw backend text the action was parsed from
    pub raw_response: Option<String>,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// The mutable record of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    task: Task,
    steps: Vec<Step>,
    iteration: u32,
    status: RunStatus,
}

impl Transcript {
    pub fn new(task: Task) -> Self {
        Self {
            task,
            steps: Vec::new(),
            iteration: 0,
            status: RunStatus::Running,
        }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Number of decision rounds consumed so far
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Append the record of one decision round and count it
    pub(crate) fn append(
        &mut self,
        action: Action,
        observation: Observation,
        raw_response: Option<String>,
        started_at: DateTime<Utc>,
        elapsed: Duration,
    ) -> &Step {
        let index = self.steps.len() as u32;
        self.steps.push(Step {
            index,
            action,
            observation,
            raw_response,
            started_at,
            elapsed_ms: elapsed.as_millis() as u64,
        });
        self.iteration += 1;
        &self.steps[index as usize]
    }

    /// Move to a terminal status. Returns false if already terminal.
    pub(crate) fn finish(&mut self, status: RunStatus) -> bool {
        if self.status.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        true
    }

    /// The most recent final-answer candidate, accepted or not
    pub fn last_candidate(&self) -> Option<&str> {
        self.steps.iter().rev().find_map(|step| match &step.action {
            Action::FinalAnswer { text } => Some(text.as_str()),
            _ => None,
        })
    }

    /// Take the steps out once the run is over
    pub(crate) fn into_steps(self) -> Vec<Step> {
        self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ToolFailure;

    fn transcript() -> Transcript {
        Transcript::new(Task::with_id("t-1", "What is 2+2?"))
    }

    #[test]
    fn test_new_transcript_is_running() {
        let t = transcript();
        assert_eq!(t.status(), RunStatus::Running);
        assert_eq!(t.iteration(), 0);
        assert!(t.steps().is_empty());
    }

    #[test]
    fn test_append_counts_iterations_in_order() {
        let mut t = transcript();
        for i in 0..3 {
            t.append(
                Action::Malformed { reason: format!("r{}", i) },
                Observation::Rejected {
                    kind: ErrorKind::MalformedAction,
                    message: "could not parse".to_string(),
                },
                None,
                Utc::now(),
                Duration::from_millis(5),
            );
        }
        assert_eq!(t.iteration(), 3);
        let indices: Vec<u32> = t.steps().iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_finish_only_once() {
        let mut t = transcript();
        assert!(!t.finish(RunStatus::Running));
        assert!(t.finish(RunStatus::Answered));
        assert!(!t.finish(RunStatus::Failed));
        assert_eq!(t.status(), RunStatus::Answered);
    }

    #[test]
    fn test_last_candidate_finds_rejected_answer() {
        let mut t = transcript();
        t.append(
            Action::FinalAnswer { text: "  ".to_string() },
            Observation::Rejected {
                kind: ErrorKind::Unnormalizable,
                message: "empty".to_string(),
            },
            None,
            Utc::now(),
            Duration::ZERO,
        );
        t.append(
            Action::ToolCall {
                name: "calculate".to_string(),
                arguments: serde_json::json!({"expression": "2+2"}),
            },
            Observation::Tool {
                attempts: vec![ToolResult::success("4")],
            },
            None,
            Utc::now(),
            Duration::ZERO,
        );
        assert_eq!(t.last_candidate(), Some("  "));
    }

    #[test]
    fn test_tool_observation_text_mentions_retries() {
        let obs = Observation::Tool {
            attempts: vec![
                ToolResult::failure(ToolFailure::timeout("slow")),
                ToolResult::failure(ToolFailure::timeout("slow")),
            ],
        };
        assert!(obs.to_prompt_text().contains("after 2 attempts"));
        assert!(obs.final_tool_result().is_some());
    }

    #[test]
    fn test_run_status_terminal() {
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Answered.is_terminal());
        assert!(RunStatus::Exhausted.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert_eq!(RunStatus::Exhausted.to_string(), "exhausted");
    }
}
