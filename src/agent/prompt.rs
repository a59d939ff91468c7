//! Prompt rendering for the action selector
//!
//! The system prompt is a Handlebars template listing the tool catalog and
//! the ReAct response format. The conversation replays the transcript: the
//! task, then each raw model response followed by its observation.

use handlebars::Handlebars;
use serde::Serialize;

use crate::domain::{Action, Transcript};
use crate::error::{AgentError, Result};
use crate::llm::Message;
use crate::tools::ToolSpec;

const SYSTEM_TEMPLATE_NAME: &str = "system";

/// Stop sequence that keeps the model from inventing its own observations
pub const OBSERVATION_STOP: &str = "\nObservation:";

const SYSTEM_TEMPLATE: &str = r#"You are a precise research assistant that answers questions by reasoning step by step and using tools.

AVAILABLE TOOLS:
{{#each tools}}
{{@index}}. {{name}} [{{category}}]: {{description}}
   Input schema: {{schema}}
{{/each}}

RESPONSE FORMAT:
For every step, reply with exactly:

Thought: <your reasoning about what is missing and which tool to use>
Action: <the exact tool name>
Action Input: <a JSON object with the tool arguments>

The system will reply with:
Observation: <the tool output>

When you have enough information, reply with:

Thought: I have gathered all necessary information.
FINAL ANSWER: <the exact answer only>

RULES:
1. Use only the Thought/Action/Action Input format, or FINAL ANSWER.
2. The text after "FINAL ANSWER:" must contain only the answer (e.g. "42", "Paris", "Yes"), formatted as the question requests. No explanations.
3. Be exact with names, dates and numbers; answers are graded by exact match.
4. Use tools whenever you are not certain of a fact or need current information.
5. If the task mentions an attached file, use the file tools to download and read it.
6. If a tool fails or your reply is rejected, read the observation and correct course.
{{#if max_iterations}}7. You have at most {{max_iterations}} steps.{{/if}}
"#;

#[derive(Serialize)]
struct ToolView<'a> {
    name: &'a str,
    category: &'static str,
    description: &'a str,
    schema: String,
}

#[derive(Serialize)]
struct SystemContext<'a> {
    tools: Vec<ToolView<'a>>,
    max_iterations: u32,
}

/// Renders the system prompt and the message history
pub struct PromptRenderer {
    handlebars: Handlebars<'static>,
}

impl PromptRenderer {
    /// Create a renderer with the built-in system template
    pub fn new() -> Result<Self> {
        Self::with_template(SYSTEM_TEMPLATE)
    }

    /// Create a renderer with a custom system template
    pub fn with_template(template: &str) -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        // Prompts are plain text, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars
            .register_template_string(SYSTEM_TEMPLATE_NAME, template)
            .map_err(|e| AgentError::Template(format!("Failed to register system template: {}", e)))?;
        Ok(Self { handlebars })
    }

    /// Render the system prompt for a tool catalog
    pub fn render_system<'a>(
        &self,
        tools: impl IntoIterator<Item = &'a ToolSpec>,
        max_iterations: u32,
    ) -> Result<String> {
        let context = SystemContext {
            tools: tools
                .into_iter()
                .map(|spec| ToolView {
                    name: &spec.name,
                    category: spec.category.label(),
                    description: &spec.description,
                    schema: spec.to_json_schema().to_string(),
                })
                .collect(),
            max_iterations,
        };

        self.handlebars
            .render(SYSTEM_TEMPLATE_NAME, &context)
            .map_err(|e| AgentError::Template(format!("Failed to render system prompt: {}", e)))
    }
}

/// Conversation for the next decision: the task, then every step as an
/// assistant turn plus an observation turn
pub fn build_messages(transcript: &Transcript) -> Vec<Message> {
    let mut messages = Vec::with_capacity(transcript.steps().len() * 2 + 1);
    messages.push(Message::user(transcript.task().to_prompt()));

    for step in transcript.steps() {
        let said = step
            .raw_response
            .clone()
            .unwrap_or_else(|| describe_action(&step.action));
        messages.push(Message::assistant(said));
        messages.push(Message::user(format!("Observation: {}", step.observation.to_prompt_text())));
    }

    messages
}

/// Text standing in for a step that has no raw response
fn describe_action(action: &Action) -> String {
    match action {
        Action::ToolCall { name, arguments } => format!("Action: {}\nAction Input: {}", name, arguments),
        Action::FinalAnswer { text } => format!("FINAL ANSWER: {}", text),
        Action::Malformed { reason } => format!("(unparseable response: {})", reason),
    }
}
