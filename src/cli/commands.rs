//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - ask: answer one question
//! - batch: answer a questions file
//! - tools: list the tool registry

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// answerloop - a tool-augmented question answering agent
#[derive(Parser, Debug)]
#[command(name = "answerloop")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer a single question
    Ask {
        /// The question to answer
        question: String,

        /// Task id (generated when absent)
        #[arg(short, long)]
        task_id: Option<String>,

        /// File attached to the task
        #[arg(short, long)]
        file: Option<String>,
    },

    /// Answer every question in a JSON file
    Batch {
        /// Questions file: [{"task_id", "question", "file_name"}]
        input: PathBuf,

        /// Where to write the answers
        #[arg(short, long, default_value = "answers.json")]
        output: PathBuf,

        /// Tasks in flight at once (config default when absent)
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,
    },

    /// List registered tools
    Tools {
        /// Only tools of this category (knowledge, web-search, files, calculator, code-execution)
        #[arg(short = 'C', long)]
        category: Option<String>,
    },
}
