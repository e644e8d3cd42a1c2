//! File-based harness configuration.
//!
//! A YAML file wires a whole evaluation together: which agent and translator
//! to build, which dataset file to read, where to write results, and the run
//! parameters. Example:
//!
//! ```yaml
//! agent:
//!   name: flaky
//!   params:
//!     fail: {"b": 2}
//! translator:
//!   name: identity
//! dataset: ./data.jsonl
//! output: ./results.jsonl
//! run:
//!   strategy: thread_pool
//!   worker_count: 4
//!   max_attempts: 3
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::agent::{AgentSpec, TranslatorSpec};
use crate::runner::RunConfig;

/// Errors that can occur while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error while reading the file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid YAML or has the wrong shape.
    #[error("invalid configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn default_translator() -> TranslatorSpec {
    TranslatorSpec::new("identity")
}

/// Full configuration for one `abet-harness run` invocation.
#[derive(Debug, Clone, Deserialize)]
pub struct HarnessConfig {
    /// Agent to evaluate.
    pub agent: AgentSpec,

    /// Translator normalizing the agent's native outputs.
    #[serde(default = "default_translator")]
    pub translator: TranslatorSpec,

    /// JSONL dataset file to evaluate over.
    pub dataset: PathBuf,

    /// Results file; defaults to the dataset path with a `results.jsonl`
    /// extension.
    #[serde(default)]
    pub output: Option<PathBuf>,

    /// Execution engine parameters.
    #[serde(default)]
    pub run: RunConfig,
}

impl HarnessConfig {
    /// Loads a configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&text)?)
    }

    /// Returns the results path, derived from the dataset path when not set.
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.dataset.with_extension("results.jsonl"))
    }
}
