//! Built-in tools
//!
//! One module per capability group:
//! - wikipedia, arxiv: knowledge lookups
//! - weather: OpenWeatherMap, only with `OPENWEATHER_API_KEY`
//! - web_search: web and news search via Serper or Tavily, only with an API key
//! - files, documents: task file download and text extraction
//! - calculator: arithmetic expression evaluation
//! - code_exec: Python in a sandboxed subprocess, only when a sandbox is available

mod arxiv;
mod calculator;
mod code_exec;
mod documents;
mod files;
mod weather;
mod web_search;
mod wikipedia;

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use serde_json::{Map, Value};

use crate::config::ToolsConfig;
use crate::domain::ToolFailure;
use crate::error::{AgentError, Result};

use super::registry::ToolRegistry;

pub use arxiv::ArxivTool;
pub use calculator::{CalculateTool, evaluate};
pub use code_exec::ExecutePythonTool;
pub use files::{DownloadFileTool, ReadFileTool};
pub use weather::WeatherTool;
pub use web_search::{SearchConfig, SearchKind, SearchProvider, WebSearchTool};
pub use wikipedia::WikipediaTool;

/// Credentials for the optional tools
#[derive(Clone, Default)]
pub struct ApiKeys {
    pub search: Option<SearchConfig>,
    pub openweather: Option<String>,
}

impl ApiKeys {
    /// Load from environment variables
    pub fn from_env() -> Self {
        let openweather = std::env::var("OPENWEATHER_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        Self {
            search: SearchConfig::from_env(),
            openweather,
        }
    }
}

impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeys")
            .field("search", &self.search)
            .field("openweather", &self.openweather.is_some())
            .finish()
    }
}

/// Registry with every built-in tool; API keys are picked up from the
/// environment
pub fn standard_registry(config: &ToolsConfig) -> Result<ToolRegistry> {
    build_registry(config, ApiKeys::from_env())
}

/// Registry with every built-in tool and explicit API keys
pub fn build_registry(config: &ToolsConfig, keys: ApiKeys) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    let client = http_client(Duration::from_secs(30))?;

    registry.register(WikipediaTool::spec(), Arc::new(WikipediaTool::new(client.clone(), config)))?;
    registry.register(ArxivTool::spec(), Arc::new(ArxivTool::new(client.clone(), config)))?;

    match keys.openweather {
        Some(key) => registry.register(WeatherTool::spec(), Arc::new(WeatherTool::new(client.clone(), config, key)))?,
        None => debug!("No OPENWEATHER_API_KEY found, weather not registered"),
    }

    match keys.search {
        Some(search) => {
            info!("Web search enabled via {}", search.provider);
            for kind in [SearchKind::Web, SearchKind::News] {
                let tool = WebSearchTool::new(client.clone(), search.clone(), kind, config.web_search_max_results);
                registry.register(tool.spec(), Arc::new(tool))?;
            }
        }
        None => debug!("No search API key found, web_search and news_search not registered"),
    }

    registry.register(DownloadFileTool::spec(), Arc::new(DownloadFileTool::new(client, config)))?;
    registry.register(ReadFileTool::spec(), Arc::new(ReadFileTool::new(config.file_read_max_chars)))?;
    registry.register(CalculateTool::spec(), Arc::new(CalculateTool))?;

    match ExecutePythonTool::from_config(config) {
        Some(tool) => registry.register(tool.spec(), Arc::new(tool))?,
        None => debug!("No code sandbox, execute_python not registered"),
    }

    Ok(registry)
}

fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AgentError::Tool(format!("Failed to create HTTP client: {}", e)))
}

/// Required string argument
fn str_arg<'a>(args: &'a Map<String, Value>, name: &str) -> std::result::Result<&'a str, ToolFailure> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolFailure::invalid_arguments(format!("'{}' must be a string", name)))
}

/// Optional positive integer argument
fn u64_arg(args: &Map<String, Value>, name: &str) -> Option<u64> {
    args.get(name).and_then(Value::as_u64)
}

/// Map a non-success HTTP response to a failure
async fn status_failure(service: &str, response: reqwest::Response) -> ToolFailure {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    ToolFailure::external(format!("{} returned {}: {}", service, status, truncate_chars(&body, 200)))
}

/// Truncate to at most `max` characters, on a char boundary
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
