//! CLI module for answerloop - command-line interface and subcommands.

pub mod commands;

pub use commands::Cli;
