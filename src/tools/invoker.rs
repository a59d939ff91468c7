//! Tool invoker: validated, time-boxed, failure-normalized tool calls
//!
//! `invoke` never returns an error or panics. Whatever the handler does, the
//! caller gets a `ToolResult`.

use std::time::Duration;

use log::{debug, warn};
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::domain::{ToolFailure, ToolResult};

use super::registry::RegisteredTool;

/// Aborts the handler task when the invocation is dropped, whether it
/// timed out or the run was cancelled mid-call
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run one attempt of a tool call
pub async fn invoke(tool: &RegisteredTool, arguments: &Value, timeout: Duration) -> ToolResult {
    let name = tool.spec.name.as_str();

    let validated = match tool.spec.validate_arguments(arguments) {
        Ok(args) => args,
        Err(failure) => {
            debug!("Rejected arguments for {}: {}", name, failure.message);
            return ToolResult::failure(failure);
        }
    };

    let handler = tool.handler.clone();
    let mut task = AbortOnDrop(tokio::spawn(async move { handler.call(validated).await }));

    match tokio::time::timeout(timeout, &mut task.0).await {
        Ok(Ok(result)) => ToolResult::from(result),
        Ok(Err(join_err)) if join_err.is_panic() => {
            warn!("Tool {} panicked", name);
            ToolResult::failure(ToolFailure::internal(format!("tool '{}' panicked", name)))
        }
        Ok(Err(join_err)) => ToolResult::failure(ToolFailure::internal(format!(
            "tool '{}' was cancelled: {}",
            name, join_err
        ))),
        Err(_) => {
            warn!("Tool {} timed out after {}ms", name, timeout.as_millis());
            ToolResult::failure(ToolFailure::timeout(format!(
                "tool '{}' timed out after {}ms",
                name,
                timeout.as_millis()
            )))
        }
    }
}
