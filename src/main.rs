use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod cli;

use answerloop::agent::Agent;
use answerloop::batch::{self, BatchSummary, Submission};
use answerloop::config::Config;
use answerloop::domain::{Observation, RunOutcome, RunStatus, Task};
use answerloop::llm::OpenAiCompatClient;
use answerloop::tools::{ToolCategory, standard_registry};
use cli::Cli;
use cli::commands::Commands;

fn setup_logging(level: Option<&str>) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("answerloop")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("answerloop.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    // RUST_LOG wins over the configured level
    let env = env_logger::Env::default().default_filter_or(level.unwrap_or("info"));
    env_logger::Builder::from_env(env)
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn build_agent(config: &Config) -> Result<Agent> {
    let settings = config.agent_settings();
    let registry = Arc::new(standard_registry(&config.tools).context("Failed to build tool registry")?);
    let client = OpenAiCompatClient::new(config.llm.to_client_config(settings.selector_timeout))
        .context("Failed to create LLM client")?;
    info!("Using model {} at {}", config.llm.model, config.llm.base_url);

    Agent::new(settings, registry, Arc::new(client)).context("Failed to create agent")
}

/// Cancel `token` on Ctrl-C
fn cancel_on_ctrl_c(token: &CancellationToken) {
    let token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, cancelling");
            token.cancel();
        }
    });
}

fn status_label(status: RunStatus) -> ColoredString {
    match status {
        RunStatus::Answered => status.to_string().green(),
        RunStatus::Exhausted => status.to_string().yellow(),
        RunStatus::Failed | RunStatus::Running => status.to_string().red(),
    }
}

fn print_transcript(outcome: &RunOutcome) {
    for step in &outcome.steps {
        println!("{} {}", format!("Step {}:", step.index + 1).cyan(), step.raw_response.as_deref().unwrap_or("").trim());
        let observation = step.observation.to_prompt_text();
        let text = match &step.observation {
            Observation::Rejected { .. } => observation.red(),
            Observation::Accepted { .. } => observation.green(),
            Observation::Tool { .. } => observation.normal(),
        };
        println!("  {} {}", "Observation:".dimmed(), text);
    }
}

async fn handle_ask_command(
    question: &str,
    task_id: Option<&str>,
    file: Option<&str>,
    cli: &Cli,
    config: &Config,
) -> Result<()> {
    let agent = build_agent(config)?;

    let mut task = match task_id {
        Some(id) => Task::with_id(id, question),
        None => Task::new(question),
    };
    if let Some(file) = file {
        task = task.with_file(file);
    }
    info!("Asking task {}: {}", task.id, task.question);

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(&cancel);
    let outcome = agent.run_with_cancel(task, cancel).await;

    if cli.is_verbose() {
        print_transcript(&outcome);
        println!();
    }

    println!(
        "{} {} ({} iterations, {}ms)",
        "Status:".bold(),
        status_label(outcome.status),
        outcome.iterations,
        outcome.elapsed_ms
    );
    match &outcome.failure {
        Some(cause) => println!("{} {}", "Failure:".red(), cause.message),
        None => {
            let label = if outcome.is_validated() { "Answer:" } else { "Best effort:" };
            println!("{} {}", label.bold(), outcome.answer_or_sentinel());
        }
    }
    Ok(())
}

async fn handle_batch_command(input: &Path, output: &Path, concurrency: Option<usize>, config: &Config) -> Result<()> {
    let tasks = batch::load_tasks(input).context(format!("Failed to read questions from {}", input.display()))?;
    let concurrency = concurrency.unwrap_or(config.agent.batch_concurrency);
    println!("{} {} tasks (concurrency {})", "Running".cyan(), tasks.len(), concurrency);

    let agent = build_agent(config)?;
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(&cancel);
    let outcomes = batch::run_batch(&agent, tasks, concurrency, &cancel).await;

    let submissions: Vec<Submission> = outcomes.iter().map(Submission::from).collect();
    for submission in &submissions {
        println!("  {} {} {}", status_label(submission.status), submission.task_id, submission.submitted_answer);
    }
    batch::write_submissions(output, &submissions).context(format!("Failed to write {}", output.display()))?;

    let summary = BatchSummary::from_outcomes(&outcomes);
    println!(
        "{} {} answered, {} exhausted, {} failed of {}; written to {}",
        "Done:".green(),
        summary.answered,
        summary.exhausted,
        summary.failed,
        summary.total(),
        output.display()
    );
    Ok(())
}

fn handle_tools_command(category: Option<&str>, config: &Config) -> Result<()> {
    let category = category
        .map(|c| {
            ToolCategory::from_str(c).ok_or_else(|| {
                let known: Vec<&str> = ToolCategory::ALL.iter().map(ToolCategory::name).collect();
                eyre!("Unknown tool category: {} (expected one of: {})", c, known.join(", "))
            })
        })
        .transpose()?;
    let registry = standard_registry(&config.tools).context("Failed to build tool registry")?;

    for spec in registry.list(category) {
        println!("{} [{}]", spec.name.green(), spec.category.label());
        println!("  {}", spec.description);
        for param in &spec.params {
            let required = if param.required { "required" } else { "optional" };
            println!("  - {} ({}, {}): {}", param.name, param.kind.schema_type(), required, param.description);
        }
    }
    Ok(())
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Ask {
            question,
            task_id,
            file,
        } => handle_ask_command(question, task_id.as_deref(), file.as_deref(), cli, config).await,
        Commands::Batch {
            input,
            output,
            concurrency,
        } => handle_batch_command(input, output, *concurrency, config).await,
        Commands::Tools { category } => handle_tools_command(category.as_deref(), config),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging with the configured level
    setup_logging(config.log_level.as_deref()).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
