//! Reasoning loop
//!
//! `Agent` drives one task from `Running` to a terminal status. Each
//! iteration asks the selector for a decision, acts on it and appends
//! exactly one step. Tool failures, unknown tools, malformed replies and
//! rejected answers all become observations; only losing the backend or
//! cancellation fails a run.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use log::{debug, error, info, warn};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::domain::{
    Action, FailureCause, FailureStage, NO_ANSWER, Observation, RunOutcome, RunStatus, Task, ToolResult, Transcript,
};
use crate::error::{ErrorKind, Result};
use crate::llm::LlmClient;
use crate::tools::{ToolRegistry, invoke};

use super::normalizer::normalize;
use super::prompt::PromptRenderer;
use super::retry::{RetryPolicy, retry};
use super::selector::ActionSelector;

/// Immutable knobs of a run, validated before they get here
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Decision rounds per run
    pub max_iterations: u32,
    pub selector_timeout: Duration,
    pub tool_timeout: Duration,
    /// Whole-run deadline
    pub run_deadline: Option<Duration>,
    pub selector_retry: RetryPolicy,
    pub tool_retry: RetryPolicy,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            selector_timeout: Duration::from_secs(120),
            tool_timeout: Duration::from_secs(60),
            run_deadline: None,
            selector_retry: RetryPolicy::default(),
            tool_retry: RetryPolicy {
                max_attempts: 2,
                base_backoff: Duration::from_millis(500),
                ..RetryPolicy::default()
            },
            temperature: 0.1,
            max_tokens: 2048,
        }
    }
}

/// How the loop ended, before it is folded into a `RunOutcome`
enum Termination {
    Answered(String),
    Exhausted,
    Failed(FailureCause),
}

/// Answers tasks with a shared tool registry and backend
pub struct Agent {
    settings: AgentSettings,
    registry: Arc<ToolRegistry>,
    selector: ActionSelector,
}

impl Agent {
    pub fn new(settings: AgentSettings, registry: Arc<ToolRegistry>, llm: Arc<dyn LlmClient>) -> Result<Self> {
        Self::with_renderer(settings, registry, llm, &PromptRenderer::new()?)
    }

    /// Create an agent whose system prompt comes from `renderer`
    pub fn with_renderer(
        settings: AgentSettings,
        registry: Arc<ToolRegistry>,
        llm: Arc<dyn LlmClient>,
        renderer: &PromptRenderer,
    ) -> Result<Self> {
        let selector = ActionSelector::new(
            llm,
            &registry,
            renderer,
            settings.max_iterations,
            settings.selector_timeout,
        )?
        .with_sampling(settings.temperature, settings.max_tokens);

        Ok(Self {
            settings,
            registry,
            selector,
        })
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Run a task to completion
    pub async fn run(&self, task: Task) -> RunOutcome {
        self.run_with_cancel(task, CancellationToken::new()).await
    }

    /// Run a task until it terminates or `cancel` fires.
    ///
    /// Cancellation and the run deadline take effect at the next suspension
    /// point; the in-flight backend or tool call is dropped.
    pub async fn run_with_cancel(&self, task: Task, cancel: CancellationToken) -> RunOutcome {
        let clock = Instant::now();
        let mut transcript = Transcript::new(task);
        let task_id = transcript.task().id.clone();
        info!(
            "Task {}: starting (budget {} iterations)",
            task_id, self.settings.max_iterations
        );

        let termination = tokio::select! {
            biased;
            _ = cancel.cancelled() => Termination::Failed(cancelled("run cancelled by caller")),
            _ = deadline(self.settings.run_deadline) => Termination::Failed(cancelled(&format!(
                "run deadline of {}ms exceeded",
                self.settings.run_deadline.unwrap_or_default().as_millis()
            ))),
            termination = self.drive(&mut transcript) => termination,
        };

        let (status, answer, failure) = match termination {
            Termination::Answered(answer) => (RunStatus::Answered, Some(answer), None),
            Termination::Exhausted => (RunStatus::Exhausted, Some(best_effort(&transcript)), None),
            Termination::Failed(cause) => (RunStatus::Failed, None, Some(cause)),
        };
        transcript.finish(status);

        let elapsed_ms = clock.elapsed().as_millis() as u64;
        match &failure {
            Some(cause) => error!(
                "Task {}: failed at {:?} after {} iteration(s): {}",
                task_id,
                cause.stage,
                transcript.iteration(),
                cause.message
            ),
            None => info!(
                "Task {}: {} after {} iteration(s) in {}ms",
                task_id,
                status,
                transcript.iteration(),
                elapsed_ms
            ),
        }

        RunOutcome {
            task_id,
            status,
            answer,
            iterations: transcript.iteration(),
            steps: transcript.into_steps(),
            elapsed_ms,
            failure,
        }
    }

    async fn drive(&self, transcript: &mut Transcript) -> Termination {
        let max_iterations = self.settings.max_iterations;
        let task_id = transcript.task().id.clone();

        while transcript.iteration() < max_iterations {
            let round = transcript.iteration() + 1;
            let started_at = Utc::now();
            let clock = Instant::now();
            debug!("Task {}: iteration {}/{} started", task_id, round, max_iterations);

            let view: &Transcript = transcript;
            let report = retry(&self.settings.selector_retry, "action selector", |_| {
                self.selector.decide(view)
            })
            .await;

            let decision = match report.result {
                Ok(decision) => decision,
                Err(err) => {
                    let attempts = err.attempts();
                    let last = err.into_error();
                    return Termination::Failed(FailureCause {
                        stage: FailureStage::ActionSelector,
                        kind: ErrorKind::SelectorUnavailable,
                        attempts,
                        last_error: last.kind_name().to_string(),
                        message: format!("no decision after {} attempt(s): {}", attempts, last),
                    });
                }
            };

            let mut accepted = None;
            let observation = match &decision.action {
                Action::ToolCall { name, arguments } => self.call_tool(name, arguments).await,
                Action::Malformed { reason } => Observation::Rejected {
                    kind: ErrorKind::MalformedAction,
                    message: format!(
                        "could not parse action: {}. Reply with 'Action:' and 'Action Input:', or with 'FINAL ANSWER:'.",
                        reason
                    ),
                },
                Action::FinalAnswer { text } => match normalize(text) {
                    Ok(answer) => {
                        accepted = Some(answer.clone());
                        Observation::Accepted { answer }
                    }
                    Err(e) => Observation::Rejected {
                        kind: ErrorKind::Unnormalizable,
                        message: format!("answer rejected: {}. Give the exact answer after 'FINAL ANSWER:'.", e),
                    },
                },
            };

            if let Observation::Rejected { kind, message } = &observation {
                warn!("Task {}: iteration {} rejected ({}): {}", task_id, round, kind, message);
            }

            let step = transcript.append(
                decision.action,
                observation,
                Some(decision.raw),
                started_at,
                clock.elapsed(),
            );
            debug!(
                "Task {}: step {} appended ({}ms)",
                task_id,
                step.index,
                step.elapsed_ms
            );

            if let Some(answer) = accepted {
                return Termination::Answered(answer);
            }
        }

        warn!(
            "Task {}: {} after {} iterations",
            task_id,
            ErrorKind::BudgetExhausted,
            max_iterations
        );
        Termination::Exhausted
    }

    /// Invoke a tool under the tool retry policy; every outcome is an observation
    async fn call_tool(&self, name: &str, arguments: &Value) -> Observation {
        let tool = match self.registry.lookup(name) {
            Ok(tool) => tool,
            Err(_) => {
                return Observation::Rejected {
                    kind: ErrorKind::UnknownTool,
                    message: format!(
                        "unknown tool '{}'; available tools: {}",
                        name,
                        self.registry.names().join(", ")
                    ),
                };
            }
        };

        let stage = format!("tool {}", name);
        let timeout = self.settings.tool_timeout;
        let report = retry(&self.settings.tool_retry, &stage, |_| async move {
            invoke(tool, arguments, timeout).await.into_result()
        })
        .await;

        let mut attempts: Vec<ToolResult> = report.retried.into_iter().map(ToolResult::failure).collect();
        attempts.push(match report.result {
            Ok(output) => ToolResult::success(output),
            Err(err) => ToolResult::failure(err.into_error()),
        });
        Observation::Tool { attempts }
    }
}

/// Completes when the run deadline passes; never without one
async fn deadline(limit: Option<Duration>) {
    match limit {
        Some(limit) => tokio::time::sleep(limit).await,
        None => std::future::pending().await,
    }
}

fn cancelled(message: &str) -> FailureCause {
    FailureCause {
        stage: FailureStage::Cancellation,
        kind: ErrorKind::Cancelled,
        attempts: 0,
        last_error: ErrorKind::Cancelled.to_string(),
        message: message.to_string(),
    }
}

/// Last candidate answer, cleaned up if possible, or the sentinel
fn best_effort(transcript: &Transcript) -> String {
    transcript
        .last_candidate()
        .map(|candidate| normalize(candidate).unwrap_or_else(|_| candidate.trim().to_string()))
        .filter(|answer| !answer.is_empty())
        .unwrap_or_else(|| NO_ANSWER.to_string())
}
