//! answerloop - a tool-augmented question answering agent
//!
//! A bounded reason/act loop: the model picks a tool or commits to an
//! answer, tools run behind a uniform failure envelope, and every run ends
//! Answered, Exhausted or Failed with a full transcript.

pub mod agent;
pub mod batch;
pub mod config;
pub mod domain;
pub mod error;
pub mod id;
pub mod llm;
pub mod tools;

pub use agent::{Agent, AgentSettings};
pub use domain::{RunOutcome, RunStatus, Task};
pub use error::{AgentError, Result};
