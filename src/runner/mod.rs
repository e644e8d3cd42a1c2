//! Execution engine: drives an agent over a dataset under one of four
//! concurrency strategies with bounded per-item retries.
//!
//! ```text
//!                ┌──────────────┐
//!                │   Dataset    │ keys/inputs enumerated once
//!                └──────┬───────┘
//!                       │ seed
//!                ┌──────▼───────┐   retry (attempt + 1)
//!                │  WorkQueue   │◄───────────────┐
//!                └──────┬───────┘                │
//!        ┌──────────────┼──────────────┐         │
//!        ▼              ▼              ▼         │
//!   ┌─────────┐    ┌─────────┐    ┌─────────┐    │
//!   │ worker 0│    │ worker 1│    │ worker N│────┘ on item failure
//!   └────┬────┘    └────┬────┘    └────┬────┘
//!        └──────────────┼──────────────┘
//!                ┌──────▼───────┐
//!                │  ResultSink  │ drained single-threaded into the dataset
//!                └──────────────┘
//! ```
//!
//! Every strategy runs the same item-processing loop (dequeue, invoke,
//! translate, deposit or retry) and differs only in how workers are
//! scheduled: inline (sequential), OS threads (thread pool), child
//! processes (process pool), or cooperative tasks with a blocking offload
//! pool (async). No ordering is guaranteed on results; the engine guarantees
//! completeness (every key resolved or dropped) and at-most-once resolution
//! per key.

pub mod async_pool;
pub mod item;
pub mod process_pool;
pub mod queue;
pub mod sequential;
pub mod thread_pool;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::agent::{Agent, AgentSpec, Translator, TranslatorSpec};
use crate::dataset::Dataset;
use crate::error::{ItemError, RunError};
use crate::message::AgentOutput;

pub use item::{
    ItemKey, ResultEntry, RetryDecision, RetryPolicy, WorkItem, DEFAULT_MAX_ATTEMPTS,
};
pub use queue::{AsyncWorkQueue, ResultSink, WorkQueue};

/// The four concurrency strategies driving the item-processing loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Single in-process worker, synchronous.
    Sequential,
    /// `worker_count` OS threads sharing the queue in memory.
    ThreadPool,
    /// `worker_count` child processes fed over message-passing channels.
    ProcessPool,
    /// `worker_count` cooperative tasks on one event loop, with blocking
    /// agent calls offloaded.
    Async,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Sequential => write!(f, "sequential"),
            Strategy::ThreadPool => write!(f, "thread_pool"),
            Strategy::ProcessPool => write!(f, "process_pool"),
            Strategy::Async => write!(f, "async"),
        }
    }
}

impl FromStr for Strategy {
    type Err = RunError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential" => Ok(Strategy::Sequential),
            "thread_pool" => Ok(Strategy::ThreadPool),
            "process_pool" => Ok(Strategy::ProcessPool),
            "async" => Ok(Strategy::Async),
            other => Err(RunError::InvalidConfig(format!(
                "unknown strategy '{other}' (expected sequential, thread_pool, process_pool or async)"
            ))),
        }
    }
}

/// Configuration for one execution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Concurrency strategy to use.
    pub strategy: Strategy,
    /// Number of workers / processes / concurrent tasks (>= 1).
    pub worker_count: usize,
    /// Invocation budget per key (>= 1).
    pub max_attempts: u32,
    /// Program to spawn for process-pool workers. Defaults to the current
    /// executable, which serves the worker protocol via its hidden `worker`
    /// subcommand.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_program: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Sequential,
            worker_count: 1,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            worker_program: None,
        }
    }
}

impl RunConfig {
    /// Creates a configuration for the given strategy with defaults.
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            ..Default::default()
        }
    }

    /// Sets the worker count.
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Sets the per-key invocation budget.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the worker program for the process-pool strategy.
    pub fn with_worker_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.worker_program = Some(program.into());
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), RunError> {
        if self.worker_count < 1 {
            return Err(RunError::InvalidConfig(
                "worker_count must be >= 1".to_string(),
            ));
        }
        if self.max_attempts < 1 {
            return Err(RunError::InvalidConfig(
                "max_attempts must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Summary of one completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Unique identifier of this run.
    pub run_id: Uuid,
    /// Strategy that executed the run.
    pub strategy: Strategy,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Number of keys in the dataset.
    pub total_keys: usize,
    /// Keys that produced a result entry.
    pub resolved: usize,
    /// Keys dropped after exhausting retries.
    pub dropped: usize,
}

impl RunReport {
    /// Returns whether every key was resolved.
    pub fn is_complete(&self) -> bool {
        self.dropped == 0
    }

    /// Returns the fraction of keys resolved, in `[0.0, 1.0]`.
    pub fn resolution_rate(&self) -> f64 {
        if self.total_keys == 0 {
            return 1.0;
        }
        self.resolved as f64 / self.total_keys as f64
    }
}

/// Runs the given strategy with live agent and translator instances.
///
/// This covers the three in-process strategies; the process-pool strategy
/// cannot transfer trait objects to worker processes and returns
/// [`RunError::ProcessPoolNeedsSpecs`]; use [`crate::Harness::run`] for it.
///
/// # Errors
///
/// Returns [`RunError`] on structural failures only. Per-item failures are
/// absorbed by the retry policy; a key that exhausts its budget is dropped
/// silently and visible as a missing output.
pub fn run_with(
    agent: Arc<dyn Agent>,
    translator: Arc<dyn Translator>,
    dataset: &mut dyn Dataset,
    config: &RunConfig,
) -> Result<RunReport, RunError> {
    config.validate()?;
    execute(dataset, config, |items, policy| match config.strategy {
        Strategy::Sequential => sequential::run(&*agent, &*translator, items, policy),
        Strategy::ThreadPool => {
            thread_pool::run(&*agent, &*translator, items, policy, config.worker_count)
        }
        Strategy::Async => async_pool::run(
            Arc::clone(&agent),
            Arc::clone(&translator),
            items,
            *policy,
            config.worker_count,
        ),
        Strategy::ProcessPool => Err(RunError::ProcessPoolNeedsSpecs),
    })
}

/// Runs the process-pool strategy from serializable specs.
pub(crate) fn run_process_pool(
    agent_spec: &AgentSpec,
    translator_spec: &TranslatorSpec,
    dataset: &mut dyn Dataset,
    config: &RunConfig,
) -> Result<RunReport, RunError> {
    config.validate()?;
    execute(dataset, config, |items, policy| {
        process_pool::run(
            agent_spec,
            translator_spec,
            items,
            policy,
            config.worker_count,
            config.worker_program.as_deref(),
        )
    })
}

/// Shared run scaffolding: seed items from the dataset, execute the
/// strategy, then drain the sink into the dataset single-threaded.
fn execute(
    dataset: &mut dyn Dataset,
    config: &RunConfig,
    strategy_fn: impl FnOnce(Vec<WorkItem>, &RetryPolicy) -> Result<Vec<ResultEntry>, RunError>,
) -> Result<RunReport, RunError> {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    let clock = Instant::now();

    let items = seed_items(dataset)?;
    let total_keys = items.len();
    let policy = RetryPolicy::new(config.max_attempts);

    info!(
        %run_id,
        strategy = %config.strategy,
        worker_count = config.worker_count,
        max_attempts = config.max_attempts,
        total_keys,
        "Starting run"
    );

    let entries = strategy_fn(items, &policy)?;

    // Write-back phase: the only point where the dataset is mutated, with
    // all workers already terminated.
    let resolved = entries.len();
    for entry in entries {
        dataset.set_output(entry.key, entry.output);
    }

    let report = RunReport {
        run_id,
        strategy: config.strategy,
        started_at,
        duration_ms: clock.elapsed().as_millis() as u64,
        total_keys,
        resolved,
        dropped: total_keys - resolved,
    };

    info!(
        %run_id,
        resolved = report.resolved,
        dropped = report.dropped,
        duration_ms = report.duration_ms,
        "Run finished"
    );

    Ok(report)
}

/// Enumerates dataset keys and builds the initial work items.
fn seed_items(dataset: &dyn Dataset) -> Result<Vec<WorkItem>, RunError> {
    let mut items = Vec::new();
    for key in dataset.keys() {
        let input = dataset
            .input(&key)
            .ok_or_else(|| RunError::MissingInput(key.to_string()))?;
        items.push(WorkItem::new(key, input));
    }
    Ok(items)
}

/// Invokes the agent and translates its output for one item, bundling both
/// steps at item granularity: a translation failure retries the whole item.
///
/// Agent panics are contained here and surfaced as item failures.
pub(crate) fn invoke_and_translate(
    agent: &dyn Agent,
    translator: &dyn Translator,
    item: &WorkItem,
) -> Result<AgentOutput, ItemError> {
    let native = catch_unwind(AssertUnwindSafe(|| agent.invoke(&item.input)))
        .map_err(|panic| ItemError::Panicked(panic_message(panic.as_ref())))??;
    Ok(translator.translate(native)?)
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "opaque panic payload".to_string()
    }
}

/// Applies the retry policy to a failed item on a blocking queue: requeue
/// with an incremented attempt, or resolve the key as dropped.
pub(crate) fn handle_item_failure(
    queue: &WorkQueue,
    policy: &RetryPolicy,
    item: WorkItem,
    err: &ItemError,
    worker_id: &str,
) {
    match policy.decide(item.attempt) {
        RetryDecision::Retry => {
            debug!(
                worker_id,
                key = %item.key,
                attempt = item.attempt,
                error = %err,
                "Item failed, requeueing"
            );
            queue.requeue(item.retried());
        }
        RetryDecision::Drop => {
            warn!(
                worker_id,
                key = %item.key,
                attempts = item.attempt + 1,
                error = %err,
                "Item failed, dropping after exhausting retries"
            );
            queue.resolve();
        }
    }
}

/// The shared worker loop run by the sequential and thread-pool strategies.
pub(crate) fn worker_loop(
    worker_id: &str,
    queue: &WorkQueue,
    sink: &ResultSink,
    agent: &dyn Agent,
    translator: &dyn Translator,
    policy: &RetryPolicy,
) {
    debug!(worker_id, "Worker started");
    while let Some(item) = queue.pop() {
        debug!(worker_id, key = %item.key, attempt = item.attempt, "Processing item");
        match invoke_and_translate(agent, translator, &item) {
            Ok(output) => {
                sink.push(ResultEntry::new(item.key, output));
                queue.resolve();
            }
            Err(err) => handle_item_failure(queue, policy, item, &err, worker_id),
        }
    }
    debug!(worker_id, "Worker stopped");
}
