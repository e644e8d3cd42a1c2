//! Error taxonomy for the execution engine.
//!
//! Two classes of failure exist, and they never mix:
//!
//! - [`ItemError`]: a single item's agent invocation or translation failed.
//!   Handled at the worker boundary by the retry policy; never aborts a run.
//! - [`RunError`]: an infrastructure fault (bad configuration, worker process
//!   IO, protocol corruption). Not retried; aborts the run and propagates to
//!   the caller.
//!
//! A key that exhausts its retries is not an error at all: the run returns
//! normally and the key simply has no output.

use thiserror::Error;

use crate::agent::{AgentError, TranslateError};
use crate::registry::RegistryError;

/// A per-item failure, recovered locally via the retry policy.
#[derive(Debug, Error)]
pub enum ItemError {
    /// The agent invocation failed.
    #[error("agent invocation failed: {0}")]
    Agent(#[from] AgentError),

    /// Translating the native output failed. Treated exactly like an
    /// invocation failure: the whole item is retried, never the translator
    /// alone.
    #[error("translation failed: {0}")]
    Translate(#[from] TranslateError),

    /// The agent panicked during invocation.
    #[error("agent panicked: {0}")]
    Panicked(String),

    /// A worker process reported an item failure over the wire.
    #[error("worker reported item failure: {0}")]
    Remote(String),
}

/// A run-level structural failure that aborts the whole run.
#[derive(Debug, Error)]
pub enum RunError {
    /// The run configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An agent or translator spec could not be resolved.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// The dataset listed a key but returned no input for it.
    #[error("dataset has no input for key '{0}'")]
    MissingInput(String),

    /// `run_with` was called with the process-pool strategy, which cannot
    /// transfer live trait objects to worker processes.
    #[error(
        "the process_pool strategy requires serializable agent/translator specs; use Harness::run"
    )]
    ProcessPoolNeedsSpecs,

    /// A worker process could not be spawned.
    #[error("failed to spawn worker process '{program}': {message}")]
    Spawn { program: String, message: String },

    /// A worker process closed its side of the protocol mid-item.
    #[error("worker process exited unexpectedly")]
    WorkerExited,

    /// A worker process answered for the wrong key.
    #[error("worker returned result for key '{got}' while processing key '{expected}'")]
    ProtocolMismatch { expected: String, got: String },

    /// Serializing or deserializing a protocol message failed.
    #[error("worker protocol serialization failed: {0}")]
    Protocol(#[from] serde_json::Error),

    /// An IO fault on a worker channel or while setting up a run.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A worker thread or task of the engine itself panicked.
    #[error("worker panicked")]
    WorkerPanicked,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_error_display() {
        let err = ItemError::Agent(AgentError::Invocation("timeout".to_string()));
        assert!(err.to_string().contains("agent invocation failed"));

        let err = ItemError::Remote("boom".to_string());
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_run_error_display() {
        let err = RunError::InvalidConfig("worker_count must be >= 1".to_string());
        assert!(err.to_string().contains("worker_count"));

        let err = RunError::ProtocolMismatch {
            expected: "3".to_string(),
            got: "7".to_string(),
        };
        assert!(err.to_string().contains("'7'"));
        assert!(err.to_string().contains("'3'"));
    }

    #[test]
    fn test_item_error_from_agent_error() {
        fn fails() -> Result<(), ItemError> {
            Err(AgentError::Invocation("nope".to_string()))?
        }
        assert!(matches!(fails(), Err(ItemError::Agent(_))));
    }
}
