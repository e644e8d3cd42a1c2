//! Async strategy: one event loop, `worker_count` cooperative tasks.
//!
//! The whole run executes on a current-thread tokio runtime built inside
//! `run`, so a single OS thread drives scheduling. Each logical worker is
//! the familiar dequeue/invoke/translate loop, except the blocking agent
//! call is offloaded with `spawn_blocking` so the event loop stays
//! responsive while an invocation is in flight; translation and queue
//! operations execute on the loop directly. With `worker_count = 1` this is
//! the sequential-async variant, not a separate algorithm.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::agent::{Agent, Translator};
use crate::error::{ItemError, RunError};

use super::queue::{AsyncWorkQueue, ResultSink};
use super::{panic_message, ResultEntry, RetryDecision, RetryPolicy, WorkItem};

pub(crate) fn run(
    agent: Arc<dyn Agent>,
    translator: Arc<dyn Translator>,
    items: Vec<WorkItem>,
    policy: RetryPolicy,
    worker_count: usize,
) -> Result<Vec<ResultEntry>, RunError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_inner(agent, translator, items, policy, worker_count))
}

async fn run_inner(
    agent: Arc<dyn Agent>,
    translator: Arc<dyn Translator>,
    items: Vec<WorkItem>,
    policy: RetryPolicy,
    worker_count: usize,
) -> Result<Vec<ResultEntry>, RunError> {
    let queue = Arc::new(AsyncWorkQueue::new());
    queue.seed(items);
    let sink = Arc::new(ResultSink::new());

    let mut tasks = JoinSet::new();
    for i in 0..worker_count {
        let queue = Arc::clone(&queue);
        let sink = Arc::clone(&sink);
        let agent = Arc::clone(&agent);
        let translator = Arc::clone(&translator);
        tasks.spawn(async move {
            worker_task(format!("async-worker-{i}"), queue, sink, agent, translator, policy).await;
        });
    }

    let mut panicked = false;
    while let Some(joined) = tasks.join_next().await {
        if joined.is_err() && !panicked {
            // A worker task died outside the item boundary; let the
            // remaining tasks drain out instead of waiting forever.
            queue.close();
            panicked = true;
        }
    }

    if panicked {
        return Err(RunError::WorkerPanicked);
    }
    Ok(sink.drain())
}

async fn worker_task(
    worker_id: String,
    queue: Arc<AsyncWorkQueue>,
    sink: Arc<ResultSink>,
    agent: Arc<dyn Agent>,
    translator: Arc<dyn Translator>,
    policy: RetryPolicy,
) {
    debug!(worker_id = %worker_id, "Worker started");
    while let Some(item) = queue.pop().await {
        debug!(worker_id = %worker_id, key = %item.key, attempt = item.attempt, "Processing item");

        // Offload the potentially long, blocking agent call; only this
        // await point suspends the worker while the loop serves siblings.
        let call_agent = Arc::clone(&agent);
        let input = item.input.clone();
        let invoked = tokio::task::spawn_blocking(move || call_agent.invoke(&input)).await;

        let outcome: Result<_, ItemError> = match invoked {
            Ok(Ok(native)) => translator.translate(native).map_err(ItemError::from),
            Ok(Err(err)) => Err(ItemError::from(err)),
            Err(join_err) => match join_err.try_into_panic() {
                Ok(payload) => Err(ItemError::Panicked(panic_message(payload.as_ref()))),
                Err(join_err) => Err(ItemError::Panicked(join_err.to_string())),
            },
        };

        match outcome {
            Ok(output) => {
                sink.push(ResultEntry::new(item.key, output));
                queue.resolve();
            }
            Err(err) => match policy.decide(item.attempt) {
                RetryDecision::Retry => {
                    debug!(
                        worker_id = %worker_id,
                        key = %item.key,
                        attempt = item.attempt,
                        error = %err,
                        "Item failed, requeueing"
                    );
                    queue.requeue(item.retried());
                }
                RetryDecision::Drop => {
                    warn!(
                        worker_id = %worker_id,
                        key = %item.key,
                        attempts = item.attempt + 1,
                        error = %err,
                        "Item failed, dropping after exhausting retries"
                    );
                    queue.resolve();
                }
            },
        }
    }
    debug!(worker_id = %worker_id, "Worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::builtin::{EchoAgent, FailAgent, FlakyAgent, IdentityTranslator};
    use crate::runner::ItemKey;
    use serde_json::json;
    use std::collections::{HashMap, HashSet};

    fn items(n: usize) -> Vec<WorkItem> {
        (0..n)
            .map(|i| WorkItem::new(ItemKey::from(i), json!(format!("input-{i}"))))
            .collect()
    }

    #[test]
    fn test_async_pool_resolves_all_items() {
        let entries = run(
            Arc::new(EchoAgent),
            Arc::new(IdentityTranslator),
            items(20),
            RetryPolicy::default(),
            4,
        )
        .expect("run should succeed");

        let keys: HashSet<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(entries.len(), 20);
        assert_eq!(keys.len(), 20);
    }

    #[test]
    fn test_async_pool_sequential_variant() {
        let entries = run(
            Arc::new(EchoAgent),
            Arc::new(IdentityTranslator),
            items(5),
            RetryPolicy::default(),
            1,
        )
        .expect("run should succeed");

        assert_eq!(entries.len(), 5);
    }

    #[test]
    fn test_async_pool_retries_and_drops() {
        let mut fail = HashMap::new();
        fail.insert("input-1".to_string(), 1);
        let agent = FlakyAgent::new(fail);

        let entries = run(
            Arc::new(agent),
            Arc::new(IdentityTranslator),
            items(3),
            RetryPolicy::new(2),
            2,
        )
        .expect("run should succeed");

        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn test_async_pool_always_failing_agent_returns_normally() {
        let entries = run(
            Arc::new(FailAgent::new("down")),
            Arc::new(IdentityTranslator),
            items(4),
            RetryPolicy::new(3),
            2,
        )
        .expect("exhausted items are not run failures");

        assert!(entries.is_empty());
    }
}
