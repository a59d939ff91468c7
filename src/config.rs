//! Configuration loading
//!
//! YAML file with every section defaulted, looked up along a fallback chain:
//! explicit path, `~/.config/answerloop/answerloop.yml`, `./answerloop.yml`,
//! then built-in defaults.

use eyre::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::agent::{AgentSettings, RetryPolicy};
use crate::llm::OpenAiConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub llm: LlmConfig,
    pub agent: AgentConfig,
    pub retry: RetryConfig,
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let defaults = OpenAiConfig::default();
        Self {
            base_url: defaults.base_url,
            model: defaults.model,
            api_key_env: defaults.api_key_env,
            temperature: 0.1,
            max_tokens: 2048,
        }
    }
}

impl LlmConfig {
    /// Client settings; the HTTP timeout matches the selector timeout
    pub fn to_client_config(&self, timeout: Duration) -> OpenAiConfig {
        OpenAiConfig {
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            api_key_env: self.api_key_env.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub max_iterations: u32,
    pub selector_timeout_ms: u64,
    pub tool_timeout_ms: u64,
    /// Whole-run deadline; none when absent
    pub run_deadline_ms: Option<u64>,
    pub batch_concurrency: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            selector_timeout_ms: 120_000,
            tool_timeout_ms: 60_000,
            run_deadline_ms: None,
            batch_concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub selector: RetryPolicyConfig,
    pub tool: RetryPolicyConfig,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            selector: RetryPolicyConfig::default(),
            tool: RetryPolicyConfig {
                max_attempts: 2,
                base_backoff_ms: 500,
                ..RetryPolicyConfig::default()
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicyConfig {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub max_backoff_ms: u64,
    pub jitter: bool,
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 1000,
            backoff_multiplier: 2.0,
            max_backoff_ms: 30_000,
            jitter: true,
        }
    }
}

impl RetryPolicyConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_backoff: Duration::from_millis(self.base_backoff_ms),
            backoff_multiplier: self.backoff_multiplier,
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            jitter: self.jitter,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Base URL of the scoring API serving task files
    pub scoring_api_url: String,
    pub wikipedia_api_url: String,
    pub web_search_max_results: u32,
    pub wikipedia_max_chars: usize,
    pub file_read_max_chars: usize,
    /// Where downloaded task files land; a temp subdirectory when absent
    pub download_dir: Option<PathBuf>,
    pub code_execution_timeout_ms: u64,
    pub code_execution_max_output: usize,
    pub sandbox: SandboxConfig,
    pub python_command: String,
    pub arxiv_api_url: String,
    pub arxiv_max_results: u32,
    /// OpenWeatherMap endpoint; the key comes from `OPENWEATHER_API_KEY`
    pub weather_api_url: String,
}

/// Isolation boundary for `execute_python`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxMode {
    /// bubblewrap namespaces: no network, read-only system dirs, no host files
    #[default]
    Bubblewrap,
    /// A wrapper command from `sandbox.command`, e.g. nsjail or firejail
    Command,
    /// No code execution tool at all
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub mode: SandboxMode,
    pub bwrap_path: String,
    /// Wrapper prefix for `mode: command`; the interpreter is appended
    pub command: Vec<String>,
    /// Address space cap (RLIMIT_AS)
    pub memory_limit_mb: u64,
    /// CPU time cap (RLIMIT_CPU)
    pub cpu_limit_secs: u64,
    /// Largest file the code may write (RLIMIT_FSIZE)
    pub max_file_size_mb: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            mode: SandboxMode::Bubblewrap,
            bwrap_path: "bwrap".to_string(),
            command: Vec::new(),
            memory_limit_mb: 1024,
            cpu_limit_secs: 30,
            max_file_size_mb: 16,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            scoring_api_url: "https://agents-course-unit4-scoring.hf.space".to_string(),
            wikipedia_api_url: "https://en.wikipedia.org/w/api.php".to_string(),
            web_search_max_results: 5,
            wikipedia_max_chars: 2000,
            file_read_max_chars: 10_000,
            download_dir: None,
            code_execution_timeout_ms: 30_000,
            code_execution_max_output: 10_000,
            sandbox: SandboxConfig::default(),
            python_command: "python3".to_string(),
            arxiv_api_url: "https://export.arxiv.org/api/query".to_string(),
            arxiv_max_results: 3,
            weather_api_url: "https://api.openweathermap.org/data/2.5/weather".to_string(),
        }
    }
}

impl ToolsConfig {
    /// Effective download directory
    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("answerloop_files"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            llm: LlmConfig::default(),
            agent: AgentConfig::default(),
            retry: RetryConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config = Self::from_yaml(&content)?;
        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the agent cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.agent.max_iterations == 0 {
            bail!("agent.max_iterations must be greater than 0");
        }
        if self.agent.selector_timeout_ms == 0 || self.agent.tool_timeout_ms == 0 {
            bail!("agent timeouts must be greater than 0");
        }
        if self.agent.batch_concurrency == 0 {
            bail!("agent.batch_concurrency must be greater than 0");
        }
        for (name, policy) in [("selector", &self.retry.selector), ("tool", &self.retry.tool)] {
            if policy.max_attempts == 0 {
                bail!("retry.{}.max_attempts must be greater than 0", name);
            }
            if policy.backoff_multiplier.is_nan() || policy.backoff_multiplier < 1.0 {
                bail!("retry.{}.backoff_multiplier must be at least 1.0", name);
            }
            if policy.max_backoff_ms < policy.base_backoff_ms {
                bail!("retry.{}.max_backoff_ms must not be below base_backoff_ms", name);
            }
        }
        let sandbox = &self.tools.sandbox;
        if sandbox.mode == SandboxMode::Command && sandbox.command.is_empty() {
            bail!("tools.sandbox.command must be set when tools.sandbox.mode is command");
        }
        if sandbox.memory_limit_mb == 0 || sandbox.cpu_limit_secs == 0 || sandbox.max_file_size_mb == 0 {
            bail!("tools.sandbox limits must be greater than 0");
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            bail!("llm.temperature must be between 0.0 and 2.0");
        }
        Ok(())
    }

    /// Immutable settings for `Agent`
    pub fn agent_settings(&self) -> AgentSettings {
        AgentSettings {
            max_iterations: self.agent.max_iterations,
            selector_timeout: Duration::from_millis(self.agent.selector_timeout_ms),
            tool_timeout: Duration::from_millis(self.agent.tool_timeout_ms),
            run_deadline: self.agent.run_deadline_ms.map(Duration::from_millis),
            selector_retry: self.retry.selector.to_policy(),
            tool_retry: self.retry.tool.to_policy(),
            temperature: self.llm.temperature,
            max_tokens: self.llm.max_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.agent.max_iterations, 15);
        assert_eq!(config.retry.selector.max_attempts, 3);
        assert_eq!(config.tools.web_search_max_results, 5);
        assert_eq!(config.tools.wikipedia_max_chars, 2000);
        assert_eq!(config.tools.file_read_max_chars, 10_000);
        assert_eq!(config.llm.model, "Qwen/Qwen2.5-72B-Instruct");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = Config::from_yaml(
            r#"
log_level: debug
agent:
  max_iterations: 5
retry:
  selector:
    max_attempts: 4
tools:
  sandbox:
    mode: command
    command: [nsjail, --quiet, --]
    memory_limit_mb: 256
"#,
        )
        .unwrap();

        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.agent.max_iterations, 5);
        assert_eq!(config.agent.tool_timeout_ms, 60_000);
        assert_eq!(config.retry.selector.max_attempts, 4);
        assert_eq!(config.retry.selector.base_backoff_ms, 1000);
        assert_eq!(config.retry.tool.max_attempts, 2);
        assert_eq!(config.tools.sandbox.mode, SandboxMode::Command);
        assert_eq!(config.tools.sandbox.command.len(), 3);
        assert_eq!(config.tools.sandbox.memory_limit_mb, 256);
        assert_eq!(config.tools.sandbox.cpu_limit_secs, 30);
    }

    #[test]
    fn test_sandbox_defaults_to_bubblewrap() {
        let config = Config::default();
        assert_eq!(config.tools.sandbox.mode, SandboxMode::Bubblewrap);
        assert_eq!(config.tools.sandbox.bwrap_path, "bwrap");

        let config = Config::from_yaml("tools:\n  sandbox:\n    mode: disabled\n").unwrap();
        assert_eq!(config.tools.sandbox.mode, SandboxMode::Disabled);
    }

    #[test]
    fn test_validate_rejects_command_mode_without_command() {
        let result = Config::from_yaml("tools:\n  sandbox:\n    mode: command\n");
        assert!(result.is_err());

        let mut config = Config::default();
        config.tools.sandbox.memory_limit_mb = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_iterations() {
        let result = Config::from_yaml("agent:\n  max_iterations: 0\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_bad_retry() {
        let mut config = Config::default();
        config.retry.tool.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.selector.backoff_multiplier = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_agent_settings_conversion() {
        let mut config = Config::default();
        config.agent.run_deadline_ms = Some(90_000);
        let settings = config.agent_settings();
        assert_eq!(settings.max_iterations, 15);
        assert_eq!(settings.run_deadline, Some(Duration::from_secs(90)));
        assert_eq!(settings.selector_retry.base_backoff, Duration::from_secs(1));
        assert_eq!(settings.tool_retry.max_attempts, 2);
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let path = PathBuf::from("/nonexistent/answerloop.yml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("answerloop.yml");
        fs::write(&path, "llm:\n  model: gpt-4o-mini\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.llm.model, "gpt-4o-mini");
    }
}
