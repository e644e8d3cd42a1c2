//! abet-harness: Execution engine for black-box agent evaluation.
//!
//! This library drives an agent over a benchmark dataset under a selectable
//! concurrency strategy (sequential, thread pool, process pool, or
//! cooperative async), retries failed items up to a bounded attempt budget,
//! and reassembles translated outputs deterministically by item key.

// Core modules
pub mod agent;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod harness;
pub mod message;
pub mod registry;
pub mod runner;
pub mod worker;

// Re-export the types most callers need
pub use agent::{Agent, AgentError, AgentSpec, TranslateError, Translator, TranslatorSpec};
pub use config::HarnessConfig;
pub use dataset::{Dataset, JsonlDataset, MemoryDataset};
pub use error::{ItemError, RunError};
pub use harness::Harness;
pub use message::{AgentOutput, Message};
pub use registry::Registry;
pub use runner::{ItemKey, RunConfig, RunReport, Strategy};
