//! wikipedia_search tool - encyclopedia lookups via the MediaWiki API

use async_trait::async_trait;
use log::debug;
use serde_json::{Map, Value};

use crate::config::ToolsConfig;
use crate::domain::ToolFailure;
use crate::tools::definition::{ParamKind, ParamSpec, ToolCategory, ToolSpec};
use crate::tools::registry::ToolHandler;

use super::{status_failure, str_arg, truncate_chars, u64_arg};

const DEFAULT_MAX_PAGES: u64 = 3;
const MAX_PAGES_LIMIT: u64 = 10;

/// Search Wikipedia and return article extracts
pub struct WikipediaTool {
    client: reqwest::Client,
    api_url: String,
    max_chars: usize,
}

impl WikipediaTool {
    pub fn new(client: reqwest::Client, config: &ToolsConfig) -> Self {
        Self {
            client,
            api_url: config.wikipedia_api_url.clone(),
            max_chars: config.wikipedia_max_chars,
        }
    }

    pub fn spec() -> ToolSpec {
        ToolSpec::new(
            "wikipedia_search",
            ToolCategory::Knowledge,
            "Search Wikipedia for factual information, definitions, historical data and \
             general knowledge. Best for biographies, historical events, scientific concepts \
             and other well-established facts.",
        )
        .with_param(ParamSpec::required("query", ParamKind::String, "The topic to search for"))
        .with_param(ParamSpec::optional(
            "max_pages",
            ParamKind::Integer,
            "Maximum number of articles to return (default: 3)",
        ))
    }
}

#[async_trait]
impl ToolHandler for WikipediaTool {
    async fn call(&self, arguments: Map<String, Value>) -> Result<String, ToolFailure> {
        let query = str_arg(&arguments, "query")?;
        let max_pages = u64_arg(&arguments, "max_pages")
            .unwrap_or(DEFAULT_MAX_PAGES)
            .clamp(1, MAX_PAGES_LIMIT);
        debug!("Searching Wikipedia for: {} (max_pages={})", query, max_pages);
        let limit = max_pages.to_string();

        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("formatversion", "2"),
                ("generator", "search"),
                ("gsrsearch", query),
                ("gsrlimit", limit.as_str()),
                ("prop", "extracts"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("exlimit", "max"),
                ("redirects", "1"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_failure("Wikipedia", response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ToolFailure::external(format!("Failed to parse Wikipedia response: {}", e)))?;

        Ok(format_pages(query, &body, self.max_chars))
    }
}

/// Render search hits in rank order, each extract capped at `max_chars`
fn format_pages(query: &str, body: &Value, max_chars: usize) -> String {
    let mut pages: Vec<&Value> = body["query"]["pages"]
        .as_array()
        .map(|pages| pages.iter().collect())
        .unwrap_or_default();

    if pages.is_empty() {
        return format!("No Wikipedia articles found for: {}", query);
    }

    pages.sort_by_key(|p| p["index"].as_u64().unwrap_or(u64::MAX));

    pages
        .iter()
        .enumerate()
        .map(|(i, page)| {
            let title = page["title"].as_str().unwrap_or("Unknown");
            let extract = page["extract"].as_str().unwrap_or("").trim();
            format!("[{}] {}\n{}", i + 1, title, truncate_chars(extract, max_chars))
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}
