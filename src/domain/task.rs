//! Task: the immutable input of a run

use serde::{Deserialize, Serialize};

use crate::id::generate_task_id;

/// A question to answer, optionally with an associated file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier (benchmark task id, or generated)
    #[serde(rename = "task_id")]
    pub id: String,

    /// The natural-language question
    pub question: String,

    /// Name or path of a file attached to the task
    #[serde(default, rename = "file_name", skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Task {
    /// Create a task with a generated id
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            id: generate_task_id(),
            question: question.into(),
            file: None,
        }
    }

    /// Create a task with an explicit id
    pub fn with_id(id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            file: None,
        }
    }

    /// Attach a file reference
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        let file = file.into();
        self.file = if file.trim().is_empty() { None } else { Some(file) };
        self
    }

    /// The attached file, ignoring blank names
    pub fn attached_file(&self) -> Option<&str> {
        self.file.as_deref().filter(|f| !f.trim().is_empty())
    }

    /// Render the task as the opening user message
    pub fn to_prompt(&self) -> String {
        let mut prompt = format!("[Task ID: {}]\n\n{}", self.id, self.question);
        if let Some(file) = self.attached_file() {
            prompt.push_str(&format!(
                "\n\nThis task has an attached file: {}. Use the file tools to inspect it.",
                file
            ));
        }
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_new_generates_id() {
        let task = Task::new("What is 2+2?");
        assert!(task.id.starts_with("task-"));
        assert_eq!(task.question, "What is 2+2?");
        assert!(task.file.is_none());
    }

    #[test]
    fn test_task_with_empty_file_is_none() {
        let task = Task::with_id("t1", "q").with_file("  ");
        assert!(task.file.is_none());
    }

    #[test]
    fn test_task_prompt_mentions_file() {
        let task = Task::with_id("abc", "Sum the column").with_file("data.csv");
        let prompt = task.to_prompt();
        assert!(prompt.starts_with("[Task ID: abc]"));
        assert!(prompt.contains("Sum the column"));
        assert!(prompt.contains("data.csv"));
    }

    #[test]
    fn test_task_deserializes_question_format() {
        let json = r#"{"task_id": "8e867cd7", "question": "How many?", "file_name": "", "Level": "1"}"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.id, "8e867cd7");
        assert_eq!(task.question, "How many?");
        assert_eq!(task.file.as_deref(), Some(""));
        assert!(task.attached_file().is_none());
        assert!(!task.to_prompt().contains("attached file"));
    }
}
