//! Process-pool strategy: `worker_count` isolated worker processes.
//!
//! Same logical behavior as the thread pool, but workers are separate
//! processes with no shared memory: items and results cross the boundary as
//! serialized protocol messages. Agents and translators are reconstructed
//! inside each worker from their specs, so nothing live is ever transferred.
//!
//! The parent keeps the queue and the retry policy. Each worker process is
//! driven by one parent-side feeder thread in lockstep: send one request,
//! read one response. Item failures come back as ordinary responses and feed
//! the retry policy; spawn, IO and serialization faults are structural and
//! abort the run: the queue is closed so sibling feeders drain out, every
//! child is killed, and the first error is surfaced.

use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use std::thread;

use tracing::{debug, warn};

use crate::agent::{AgentSpec, TranslatorSpec};
use crate::error::{ItemError, RunError};
use crate::worker::protocol::{WorkRequest, WorkResponse};

use super::queue::{ResultSink, WorkQueue};
use super::{handle_item_failure, ResultEntry, RetryPolicy, WorkItem};

pub(crate) fn run(
    agent_spec: &AgentSpec,
    translator_spec: &TranslatorSpec,
    items: Vec<WorkItem>,
    policy: &RetryPolicy,
    worker_count: usize,
    worker_program: Option<&Path>,
) -> Result<Vec<ResultEntry>, RunError> {
    let program = match worker_program {
        Some(path) => path.to_path_buf(),
        None => std::env::current_exe()?,
    };
    let agent_json = serde_json::to_string(agent_spec)?;
    let translator_json = serde_json::to_string(translator_spec)?;

    let queue = WorkQueue::new();
    queue.seed(items);
    let sink = ResultSink::new();
    let first_error: Mutex<Option<RunError>> = Mutex::new(None);

    thread::scope(|scope| {
        for i in 0..worker_count {
            let queue = &queue;
            let sink = &sink;
            let first_error = &first_error;
            let program = &program;
            let agent_json = &agent_json;
            let translator_json = &translator_json;
            scope.spawn(move || {
                let worker_id = format!("process-worker-{i}");
                if let Err(err) = feed_worker(
                    &worker_id,
                    program,
                    agent_json,
                    translator_json,
                    queue,
                    sink,
                    policy,
                ) {
                    warn!(worker_id, error = %err, "Worker channel failed, aborting run");
                    queue.close();
                    let mut slot = first_error.lock().unwrap_or_else(|p| p.into_inner());
                    slot.get_or_insert(err);
                }
            });
        }
    });

    let error = first_error.into_inner().unwrap_or_else(|p| p.into_inner());
    match error {
        Some(err) => Err(err),
        None => Ok(sink.drain()),
    }
}

/// Spawns one worker process and feeds it items until the queue signals
/// completion, then closes its stdin and reaps it.
fn feed_worker(
    worker_id: &str,
    program: &Path,
    agent_json: &str,
    translator_json: &str,
    queue: &WorkQueue,
    sink: &ResultSink,
    policy: &RetryPolicy,
) -> Result<(), RunError> {
    let mut child = Command::new(program)
        .arg("worker")
        .arg("--agent-spec")
        .arg(agent_json)
        .arg("--translator-spec")
        .arg(translator_json)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .map_err(|err| RunError::Spawn {
            program: program.display().to_string(),
            message: err.to_string(),
        })?;
    debug!(worker_id, pid = child.id(), "Worker process spawned");

    let result = feed_loop(worker_id, &mut child, queue, sink, policy);

    match &result {
        Ok(()) => {
            // Stdin is already dropped by the feed loop; the worker sees EOF
            // and exits on its own.
            let _ = child.wait();
            debug!(worker_id, "Worker process reaped");
        }
        Err(_) => {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
    result
}

fn feed_loop(
    worker_id: &str,
    child: &mut Child,
    queue: &WorkQueue,
    sink: &ResultSink,
    policy: &RetryPolicy,
) -> Result<(), RunError> {
    let mut stdin = child.stdin.take().ok_or(RunError::WorkerExited)?;
    let stdout = child.stdout.take().ok_or(RunError::WorkerExited)?;
    let mut lines = BufReader::new(stdout).lines();

    while let Some(item) = queue.pop() {
        debug!(worker_id, key = %item.key, attempt = item.attempt, "Dispatching item");

        let request = WorkRequest::from_item(&item);
        serde_json::to_writer(&mut stdin, &request)?;
        stdin.write_all(b"\n")?;
        stdin.flush()?;

        let line = lines.next().ok_or(RunError::WorkerExited)??;
        let response: WorkResponse = serde_json::from_str(&line)?;
        if response.key() != &item.key {
            return Err(RunError::ProtocolMismatch {
                expected: item.key.to_string(),
                got: response.key().to_string(),
            });
        }

        match response {
            WorkResponse::Ok { key, output } => {
                sink.push(ResultEntry::new(key, output));
                queue.resolve();
            }
            WorkResponse::Err { message, .. } => {
                let err = ItemError::Remote(message);
                handle_item_failure(queue, policy, item, &err, worker_id);
            }
        }
    }
    Ok(())
}
