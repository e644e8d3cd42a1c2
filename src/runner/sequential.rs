//! Sequential strategy: one logical worker, in-process.
//!
//! Items are processed synchronously until the queue empties, retried items
//! included: a failed item joins the back of the queue and is reprocessed
//! within the same run, interleaved with not-yet-attempted items.
//! Deterministic up to retry interleaving, which is insertion order.

use crate::agent::{Agent, Translator};
use crate::error::RunError;

use super::queue::{ResultSink, WorkQueue};
use super::{worker_loop, ResultEntry, RetryPolicy, WorkItem};

pub(crate) fn run(
    agent: &dyn Agent,
    translator: &dyn Translator,
    items: Vec<WorkItem>,
    policy: &RetryPolicy,
) -> Result<Vec<ResultEntry>, RunError> {
    let queue = WorkQueue::new();
    queue.seed(items);
    let sink = ResultSink::new();

    // Single consumer: pop never blocks, it only interleaves retries.
    worker_loop("sequential-0", &queue, &sink, agent, translator, policy);

    Ok(sink.drain())
}
