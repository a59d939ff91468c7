//! web_search / news_search tools - Serper or Tavily

use async_trait::async_trait;
use log::debug;
use serde_json::{Map, Value, json};

use crate::domain::ToolFailure;
use crate::tools::definition::{ParamKind, ParamSpec, ToolCategory, ToolSpec};
use crate::tools::registry::ToolHandler;

use super::{status_failure, str_arg, truncate_chars, u64_arg};

const SERPER_URL: &str = "https://google.serper.dev/search";
const SERPER_NEWS_URL: &str = "https://google.serper.dev/news";
const TAVILY_URL: &str = "https://api.tavily.com/search";
const MAX_RESULTS_LIMIT: u64 = 20;

/// Search API provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchProvider {
    Serper,
    Tavily,
}

impl std::fmt::Display for SearchProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchProvider::Serper => f.write_str("serper"),
            SearchProvider::Tavily => f.write_str("tavily"),
        }
    }
}

/// Configuration for search API
#[derive(Clone)]
pub struct SearchConfig {
    pub provider: SearchProvider,
    api_key: String,
}

impl SearchConfig {
    pub fn new(provider: SearchProvider, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
        }
    }

    /// Load from environment variables
    pub fn from_env() -> Option<Self> {
        let lookup = |var: &str| std::env::var(var).ok().filter(|k| !k.trim().is_empty());

        if let Some(api_key) = lookup("SERPER_API_KEY") {
            debug!("SearchConfig: found SERPER_API_KEY");
            return Some(Self::new(SearchProvider::Serper, api_key));
        }

        if let Some(api_key) = lookup("TAVILY_API_KEY") {
            debug!("SearchConfig: found TAVILY_API_KEY");
            return Some(Self::new(SearchProvider::Tavily, api_key));
        }

        debug!("SearchConfig: no API key found");
        None
    }
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig").field("provider", &self.provider).finish()
    }
}

/// What a search tool looks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    Web,
    News,
}

/// One normalized search hit
#[derive(Debug, Clone, PartialEq)]
struct SearchHit {
    title: String,
    url: String,
    snippet: String,
    source: Option<String>,
    date: Option<String>,
}

/// Search the web, or recent news, for current information
pub struct WebSearchTool {
    client: reqwest::Client,
    config: SearchConfig,
    kind: SearchKind,
    default_max_results: u32,
}

impl WebSearchTool {
    pub fn new(client: reqwest::Client, config: SearchConfig, kind: SearchKind, default_max_results: u32) -> Self {
        Self {
            client,
            config,
            kind,
            default_max_results,
        }
    }

    pub fn spec(&self) -> ToolSpec {
        let spec = match self.kind {
            SearchKind::Web => ToolSpec::new(
                "web_search",
                ToolCategory::WebSearch,
                "Search the web for current information, news and real-time data. Best for recent \
                 events, up-to-date facts and anything not covered by an encyclopedia.",
            ),
            SearchKind::News => ToolSpec::new(
                "news_search",
                ToolCategory::WebSearch,
                "Search for recent news articles and current events. Best for breaking news and \
                 latest developments. Returns articles with date, source and content.",
            ),
        };
        spec.with_param(ParamSpec::required("query", ParamKind::String, "The search query"))
            .with_param(ParamSpec::optional(
                "max_results",
                ParamKind::Integer,
                "Maximum number of results (default from configuration)",
            ))
    }

    async fn search_serper(&self, query: &str, max_results: u64) -> Result<Vec<SearchHit>, ToolFailure> {
        let url = match self.kind {
            SearchKind::Web => SERPER_URL,
            SearchKind::News => SERPER_NEWS_URL,
        };
        let response = self
            .client
            .post(url)
            .header("X-API-KEY", &self.config.api_key)
            .json(&json!({ "q": query, "num": max_results }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_failure("Serper", response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ToolFailure::external(format!("Failed to parse Serper response: {}", e)))?;

        Ok(match self.kind {
            SearchKind::Web => collect_hits(&body["organic"], "link", "snippet", "date"),
            SearchKind::News => collect_hits(&body["news"], "link", "snippet", "date"),
        })
    }

    async fn search_tavily(&self, query: &str, max_results: u64) -> Result<Vec<SearchHit>, ToolFailure> {
        let topic = match self.kind {
            SearchKind::Web => "general",
            SearchKind::News => "news",
        };
        let response = self
            .client
            .post(TAVILY_URL)
            .json(&json!({
                "api_key": self.config.api_key,
                "query": query,
                "topic": topic,
                "max_results": max_results,
                "search_depth": "basic"
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_failure("Tavily", response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ToolFailure::external(format!("Failed to parse Tavily response: {}", e)))?;

        Ok(collect_hits(&body["results"], "url", "content", "published_date"))
    }
}

#[async_trait]
impl ToolHandler for WebSearchTool {
    async fn call(&self, arguments: Map<String, Value>) -> Result<String, ToolFailure> {
        let query = str_arg(&arguments, "query")?;
        let max_results = u64_arg(&arguments, "max_results")
            .unwrap_or(self.default_max_results as u64)
            .clamp(1, MAX_RESULTS_LIMIT);
        debug!(
            "Searching {:?} for: {} (max_results={}, provider={})",
            self.kind, query, max_results, self.config.provider
        );

        let mut hits = match self.config.provider {
            SearchProvider::Serper => self.search_serper(query, max_results).await?,
            SearchProvider::Tavily => self.search_tavily(query, max_results).await?,
        };
        hits.truncate(max_results as usize);

        Ok(format_hits(self.kind, query, &hits))
    }
}

fn collect_hits(results: &Value, url_key: &str, snippet_key: &str, date_key: &str) -> Vec<SearchHit> {
    let text = |r: &Value, key: &str| r[key].as_str().filter(|s| !s.is_empty()).map(str::to_string);
    results
        .as_array()
        .map(|results| {
            results
                .iter()
                .map(|r| SearchHit {
                    title: text(r, "title").unwrap_or_else(|| "No title".to_string()),
                    url: text(r, url_key).unwrap_or_else(|| "No URL".to_string()),
                    snippet: text(r, snippet_key).unwrap_or_else(|| "No description".to_string()),
                    source: text(r, "source"),
                    date: text(r, date_key),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn format_hits(kind: SearchKind, query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return match kind {
            SearchKind::Web => format!("No web search results found for: {}", query),
            SearchKind::News => format!("No news articles found for: {}", query),
        };
    }

    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            let byline = match kind {
                SearchKind::Web => String::new(),
                SearchKind::News => format!(
                    "Source: {} | Date: {}\n",
                    hit.source.as_deref().unwrap_or("Unknown source"),
                    hit.date.as_deref().unwrap_or("Unknown date")
                ),
            };
            format!(
                "[{}] {}\n{}{}\nURL: {}",
                i + 1,
                hit.title,
                byline,
                truncate_chars(&hit.snippet, 500),
                hit.url
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_serper_hits() {
        let body = json!({
            "organic": [
                { "title": "Rust", "link": "https://rust-lang.org", "snippet": "A language" },
                { "title": "Crates", "link": "https://crates.io" }
            ]
        });
        let hits = collect_hits(&body["organic"], "link", "snippet", "date");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url, "https://rust-lang.org");
        assert_eq!(hits[1].snippet, "No description");
    }

    #[test]
    fn test_collect_tavily_hits() {
        let body = json!({
            "results": [ { "title": "Tokio", "url": "https://tokio.rs", "content": "Async runtime" } ]
        });
        let hits = collect_hits(&body["results"], "url", "content", "published_date");
        assert_eq!(hits[0].snippet, "Async runtime");
        assert_eq!(hits[0].date, None);
    }

    #[test]
    fn test_news_hits_carry_source_and_date() {
        let body = json!({
            "news": [{
                "title": "Rust 2.0 announced",
                "link": "https://example.com/rust",
                "snippet": "Big news.",
                "date": "2 hours ago",
                "source": "Example Times"
            }, {
                "title": "Undated",
                "link": "https://example.com/u",
                "snippet": "Quiet."
            }]
        });
        let hits = collect_hits(&body["news"], "link", "snippet", "date");
        let out = format_hits(SearchKind::News, "rust", &hits);
        assert!(out.starts_with(
            "[1] Rust 2.0 announced\nSource: Example Times | Date: 2 hours ago\nBig news.\nURL: https://example.com/rust"
        ));
        assert!(out.contains("[2] Undated\nSource: Unknown source | Date: Unknown date\nQuiet."));
        assert_eq!(format_hits(SearchKind::News, "zzz", &[]), "No news articles found for: zzz");
    }

    #[test]
    fn test_tool_names_follow_kind() {
        let config = SearchConfig::new(SearchProvider::Serper, "key");
        let web = WebSearchTool::new(reqwest::Client::new(), config.clone(), SearchKind::Web, 5);
        let news = WebSearchTool::new(reqwest::Client::new(), config, SearchKind::News, 5);
        assert_eq!(web.spec().name, "web_search");
        assert_eq!(news.spec().name, "news_search");
        assert_eq!(news.spec().category, ToolCategory::WebSearch);
    }

    #[test]
    fn test_format_hits() {
        let hits = vec![SearchHit {
            title: "Rust".to_string(),
            url: "https://rust-lang.org".to_string(),
            snippet: "A language".to_string(),
            source: None,
            date: None,
        }];
        assert_eq!(
            format_hits(SearchKind::Web, "rust", &hits),
            "[1] Rust\nA language\nURL: https://rust-lang.org"
        );
        assert_eq!(format_hits(SearchKind::Web, "zzz", &[]), "No web search results found for: zzz");
    }

    #[test]
    fn test_debug_hides_key() {
        let config = SearchConfig::new(SearchProvider::Serper, "secret-key");
        assert!(!format!("{:?}", config).contains("secret-key"));
    }
}
