//! Batch mode: many tasks, bounded concurrency
//!
//! Input is a JSON array of questions (`task_id`, `question`, `file_name`).
//! Output is a JSON array of submissions (`task_id`, `submitted_answer`)
//! with the run status alongside.

use std::path::Path;

use futures::stream::{self, StreamExt};
use log::info;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::agent::Agent;
use crate::domain::{RunOutcome, RunStatus, Task};
use crate::error::Result;

/// One answer in submission format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub task_id: String,
    pub submitted_answer: String,
    pub status: RunStatus,
}

impl From<&RunOutcome> for Submission {
    fn from(outcome: &RunOutcome) -> Self {
        Self {
            task_id: outcome.task_id.clone(),
            submitted_answer: outcome.answer_or_sentinel().to_string(),
            status: outcome.status,
        }
    }
}

/// Read a questions file
pub fn load_tasks(path: &Path) -> Result<Vec<Task>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Write submissions as pretty JSON
pub fn write_submissions(path: &Path, submissions: &[Submission]) -> Result<()> {
    let json = serde_json::to_string_pretty(submissions)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Run every task with at most `concurrency` in flight. Outcomes come back
/// in input order.
pub async fn run_batch(agent: &Agent, tasks: Vec<Task>, concurrency: usize, cancel: &CancellationToken) -> Vec<RunOutcome> {
    let total = tasks.len();
    info!("Running batch of {} tasks, concurrency {}", total, concurrency);

    let mut outcomes: Vec<(usize, RunOutcome)> = stream::iter(tasks.into_iter().enumerate())
        .map(|(index, task)| {
            let token = cancel.child_token();
            async move { (index, agent.run_with_cancel(task, token).await) }
        })
        .buffer_unordered(concurrency.max(1))
        .inspect(|(_, outcome)| info!("Batch: task {} finished ({})", outcome.task_id, outcome.status))
        .collect()
        .await;

    outcomes.sort_by_key(|(index, _)| *index);
    outcomes.into_iter().map(|(_, outcome)| outcome).collect()
}

/// Counts per terminal status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub answered: usize,
    pub exhausted: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[RunOutcome]) -> Self {
        outcomes.iter().fold(Self::default(), |mut summary, outcome| {
            match outcome.status {
                RunStatus::Answered => summary.answered += 1,
                RunStatus::Exhausted => summary.exhausted += 1,
                RunStatus::Failed | RunStatus::Running => summary.failed += 1,
            }
            summary
        })
    }

    pub fn total(&self) -> usize {
        self.answered + self.exhausted + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentSettings, RetryPolicy};
    use crate::domain::NO_ANSWER;
    use crate::llm::ScriptedLlmClient;
    use crate::tools::ToolRegistry;
    use std::sync::Arc;

    #[test]
    fn test_load_tasks_question_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("questions.json");
        std::fs::write(
            &path,
            r#"[
                {"task_id": "a1", "question": "What is 2+2?", "Level": "1", "file_name": ""},
                {"task_id": "b2", "question": "Sum the sheet", "file_name": "sheet.xlsx"}
            ]"#,
        )
        .unwrap();

        let tasks = load_tasks(&path).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, "a1");
        assert_eq!(tasks[0].attached_file(), None);
        assert_eq!(tasks[1].attached_file(), Some("sheet.xlsx"));
    }

    #[test]
    fn test_load_tasks_rejects_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("questions.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load_tasks(&path).is_err());
        assert!(load_tasks(&dir.path().join("missing.json")).is_err());
    }

    #[tokio::test]
    async fn test_run_batch_keeps_input_order() {
        let llm = Arc::new(ScriptedLlmClient::from_texts(["FINAL ANSWER: 4"]));
        let settings = AgentSettings {
            selector_retry: RetryPolicy::immediate(1),
            ..AgentSettings::default()
        };
        let agent = Agent::new(settings, Arc::new(ToolRegistry::new()), llm).unwrap();
        let tasks: Vec<Task> = (0..5).map(|i| Task::with_id(format!("t{}", i), "What is 2+2?")).collect();

        let outcomes = run_batch(&agent, tasks, 2, &CancellationToken::new()).await;
        let ids: Vec<&str> = outcomes.iter().map(|o| o.task_id.as_str()).collect();
        assert_eq!(ids, vec!["t0", "t1", "t2", "t3", "t4"]);
        assert_eq!(BatchSummary::from_outcomes(&outcomes).answered, 5);

        let submissions: Vec<Submission> = outcomes.iter().map(Submission::from).collect();
        assert_eq!(submissions[0].submitted_answer, "4");
    }

    #[test]
    fn test_failed_submission_uses_sentinel() {
        let outcome = RunOutcome {
            task_id: "t".to_string(),
            status: RunStatus::Failed,
            answer: None,
            steps: vec![],
            iterations: 0,
            elapsed_ms: 1,
            failure: None,
        };
        let submission = Submission::from(&outcome);
        assert_eq!(submission.submitted_answer, NO_ANSWER);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("answers.json");
        write_submissions(&path, &[submission]).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"submitted_answer\": \"Unable to determine answer\""));
        assert!(written.contains("\"status\": \"failed\""));
    }
}
