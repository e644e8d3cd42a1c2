//! Thread-pool strategy: `worker_count` OS threads over a shared queue.
//!
//! Workers share the queue and sink directly (no copying). Each worker
//! blocks on the queue's pending-count-aware `pop`, so termination is
//! race-free against concurrent re-enqueues from sibling workers. The sink
//! is drained by the caller only after every thread has joined.

use std::thread;

use tracing::debug;

use crate::agent::{Agent, Translator};
use crate::error::RunError;

use super::queue::{ResultSink, WorkQueue};
use super::{worker_loop, ResultEntry, RetryPolicy, WorkItem};

/// Closes the queue if the owning worker unwinds, so siblings blocked in
/// `pop` on a key the dead worker will never resolve are woken instead of
/// waiting forever.
struct CloseOnPanic<'a>(&'a WorkQueue);

impl Drop for CloseOnPanic<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.close();
        }
    }
}

pub(crate) fn run(
    agent: &dyn Agent,
    translator: &dyn Translator,
    items: Vec<WorkItem>,
    policy: &RetryPolicy,
    worker_count: usize,
) -> Result<Vec<ResultEntry>, RunError> {
    let queue = WorkQueue::new();
    queue.seed(items);
    let sink = ResultSink::new();

    let mut panicked = false;
    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(worker_count);
        for i in 0..worker_count {
            let queue = &queue;
            let sink = &sink;
            handles.push(scope.spawn(move || {
                let _guard = CloseOnPanic(queue);
                worker_loop(&format!("worker-{i}"), queue, sink, agent, translator, policy);
            }));
        }

        // The guard has already closed the queue by the time a panicked
        // worker is joined, so joining in spawn order cannot block on a
        // sibling parked behind the abandoned key.
        for handle in handles {
            if handle.join().is_err() {
                panicked = true;
            }
        }
    });
    debug!(worker_count, "All workers joined");

    if panicked {
        return Err(RunError::WorkerPanicked);
    }
    Ok(sink.drain())
}
