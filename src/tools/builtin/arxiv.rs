//! arxiv_search tool - academic papers through the arXiv Atom API

use async_trait::async_trait;
use log::debug;
use quick_xml::de::from_str as xml_from_str;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::ToolsConfig;
use crate::domain::ToolFailure;
use crate::tools::definition::{ParamKind, ParamSpec, ToolCategory, ToolSpec};
use crate::tools::registry::ToolHandler;

use super::{status_failure, str_arg, truncate_chars, u64_arg};

const MAX_RESULTS_LIMIT: u64 = 10;
const SUMMARY_CHARS: usize = 500;
const SHOWN_AUTHORS: usize = 3;

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    published: String,
    #[serde(rename = "author", default)]
    authors: Vec<Author>,
    #[serde(default)]
    id: String,
}

#[derive(Debug, Deserialize)]
struct Author {
    #[serde(default)]
    name: String,
}

/// Search arXiv for papers
pub struct ArxivTool {
    client: reqwest::Client,
    api_url: String,
    default_max_results: u32,
}

impl ArxivTool {
    pub fn new(client: reqwest::Client, config: &ToolsConfig) -> Self {
        Self {
            client,
            api_url: config.arxiv_api_url.clone(),
            default_max_results: config.arxiv_max_results,
        }
    }

    pub fn spec() -> ToolSpec {
        ToolSpec::new(
            "arxiv_search",
            ToolCategory::Knowledge,
            "Search arXiv for academic papers, research findings and scientific publications. \
             Returns title, authors, publication date and abstract for each paper.",
        )
        .with_param(ParamSpec::required("query", ParamKind::String, "Search query for papers"))
        .with_param(ParamSpec::optional(
            "max_results",
            ParamKind::Integer,
            "Maximum number of papers (default from configuration)",
        ))
    }
}

#[async_trait]
impl ToolHandler for ArxivTool {
    async fn call(&self, arguments: Map<String, Value>) -> Result<String, ToolFailure> {
        let query = str_arg(&arguments, "query")?;
        let max_results = u64_arg(&arguments, "max_results")
            .unwrap_or(self.default_max_results as u64)
            .clamp(1, MAX_RESULTS_LIMIT);
        debug!("Searching arXiv for: {} (max_results={})", query, max_results);

        let search_query = format!("all:{}", query);
        let limit = max_results.to_string();
        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("search_query", search_query.as_str()),
                ("start", "0"),
                ("max_results", limit.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_failure("arXiv", response).await);
        }

        let body = response.text().await?;
        let feed = parse_feed(&body)?;
        Ok(format_papers(query, &feed.entries))
    }
}

fn parse_feed(xml: &str) -> Result<Feed, ToolFailure> {
    xml_from_str(xml).map_err(|e| ToolFailure::external(format!("Failed to parse arXiv response: {}", e)))
}

/// Collapse the line wrapping arXiv puts into titles and abstracts
fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn format_authors(authors: &[Author]) -> String {
    if authors.is_empty() {
        return "Unknown authors".to_string();
    }
    let mut shown = authors
        .iter()
        .take(SHOWN_AUTHORS)
        .map(|a| a.name.trim())
        .collect::<Vec<_>>()
        .join(", ");
    if authors.len() > SHOWN_AUTHORS {
        shown.push_str(" et al.");
    }
    shown
}

fn format_papers(query: &str, entries: &[Entry]) -> String {
    if entries.is_empty() {
        return format!("No arXiv papers found for: {}", query);
    }

    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let published = match entry.published.get(..10) {
                Some(date) => date,
                None if entry.published.is_empty() => "Unknown date",
                None => entry.published.as_str(),
            };
            let mut text = format!(
                "[{}] {}\nAuthors: {}\nPublished: {}\nSummary: {}",
                i + 1,
                collapse_whitespace(&entry.title),
                format_authors(&entry.authors),
                published,
                truncate_chars(&collapse_whitespace(&entry.summary), SUMMARY_CHARS)
            );
            if !entry.id.is_empty() {
                text.push_str(&format!("\nURL: {}", entry.id.trim()));
            }
            text
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}
