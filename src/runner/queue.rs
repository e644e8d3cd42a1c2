//! Work item queue and result sink primitives.
//!
//! The queue pairs a deque with a pending-count: the number of keys that are
//! not yet resolved or dropped. `pop` blocks until an item is available and
//! returns `None` only once the pending count hits zero (or the queue is
//! closed), so workers terminate cleanly instead of polling emptiness: an
//! empty deque with in-flight items may still be re-fed by a retry from
//! another worker.
//!
//! Two variants share the same contract: [`WorkQueue`] blocks the calling
//! OS thread (sequential, thread-pool and process-pool strategies), while
//! [`AsyncWorkQueue`] suspends the calling task (async strategy).

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};

use tokio::sync::Notify;

use super::item::{ResultEntry, WorkItem};

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<WorkItem>,
    pending: usize,
    closed: bool,
}

enum Popped {
    Item(WorkItem),
    Done,
    Wait,
}

impl QueueState {
    fn try_pop(&mut self) -> Popped {
        if self.closed {
            return Popped::Done;
        }
        if let Some(item) = self.items.pop_front() {
            return Popped::Item(item);
        }
        if self.pending == 0 {
            return Popped::Done;
        }
        Popped::Wait
    }
}

// A poisoned lock means a worker panicked mid-operation; the state itself is
// always left consistent, so recover it instead of cascading the panic.
fn recover<'a, T>(
    result: Result<MutexGuard<'a, T>, std::sync::PoisonError<MutexGuard<'a, T>>>,
) -> MutexGuard<'a, T> {
    result.unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Blocking work item queue with a pending-work counter.
#[derive(Debug, Default)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl WorkQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues the initial items, raising the pending count accordingly.
    pub fn seed(&self, items: impl IntoIterator<Item = WorkItem>) {
        let mut state = recover(self.state.lock());
        for item in items {
            state.items.push_back(item);
            state.pending += 1;
        }
        drop(state);
        self.available.notify_all();
    }

    /// Dequeues the next item, blocking while the queue is empty but work is
    /// still pending. Returns `None` once every key has been resolved or
    /// dropped, or the queue was closed.
    ///
    /// Ownership of the returned item transfers atomically to the caller.
    pub fn pop(&self) -> Option<WorkItem> {
        let mut state = recover(self.state.lock());
        loop {
            match state.try_pop() {
                Popped::Item(item) => return Some(item),
                Popped::Done => return None,
                Popped::Wait => state = recover(self.available.wait(state)),
            }
        }
    }

    /// Re-enqueues a retried item. The pending count is untouched: the key
    /// was already counted and is still unresolved.
    pub fn requeue(&self, item: WorkItem) {
        let mut state = recover(self.state.lock());
        state.items.push_back(item);
        drop(state);
        self.available.notify_one();
    }

    /// Marks one key as resolved or dropped. At zero pending, wakes every
    /// blocked popper so workers can terminate.
    pub fn resolve(&self) {
        let mut state = recover(self.state.lock());
        state.pending = state.pending.saturating_sub(1);
        let done = state.pending == 0;
        drop(state);
        if done {
            self.available.notify_all();
        }
    }

    /// Aborts the queue: all current and future `pop`s return `None`.
    ///
    /// Used when a sibling worker hits a structural failure so the rest of
    /// the pool drains out instead of blocking on work that will never
    /// resolve.
    pub fn close(&self) {
        let mut state = recover(self.state.lock());
        state.closed = true;
        drop(state);
        self.available.notify_all();
    }

    /// Returns the number of keys not yet resolved or dropped.
    pub fn pending(&self) -> usize {
        recover(self.state.lock()).pending
    }
}

/// Async variant of [`WorkQueue`]; `pop` suspends the task instead of
/// blocking the event-loop thread.
#[derive(Debug, Default)]
pub struct AsyncWorkQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl AsyncWorkQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues the initial items, raising the pending count accordingly.
    pub fn seed(&self, items: impl IntoIterator<Item = WorkItem>) {
        let mut state = recover(self.state.lock());
        for item in items {
            state.items.push_back(item);
            state.pending += 1;
        }
        drop(state);
        self.notify.notify_waiters();
    }

    /// Dequeues the next item, suspending while the queue is empty but work
    /// is still pending. Same contract as [`WorkQueue::pop`].
    pub async fn pop(&self) -> Option<WorkItem> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register for wakeups before inspecting state, otherwise a
            // notification landing between the check and the await is lost.
            notified.as_mut().enable();

            match recover(self.state.lock()).try_pop() {
                Popped::Item(item) => return Some(item),
                Popped::Done => return None,
                Popped::Wait => {}
            }
            notified.await;
        }
    }

    /// Re-enqueues a retried item without touching the pending count.
    pub fn requeue(&self, item: WorkItem) {
        let mut state = recover(self.state.lock());
        state.items.push_back(item);
        drop(state);
        self.notify.notify_waiters();
    }

    /// Marks one key as resolved or dropped.
    pub fn resolve(&self) {
        let mut state = recover(self.state.lock());
        state.pending = state.pending.saturating_sub(1);
        let done = state.pending == 0;
        drop(state);
        if done {
            self.notify.notify_waiters();
        }
    }

    /// Aborts the queue: all current and future `pop`s return `None`.
    pub fn close(&self) {
        let mut state = recover(self.state.lock());
        state.closed = true;
        drop(state);
        self.notify.notify_waiters();
    }

    /// Returns the number of keys not yet resolved or dropped.
    pub fn pending(&self) -> usize {
        recover(self.state.lock()).pending
    }
}

/// Collects completed result entries pending final write-back.
#[derive(Debug, Default)]
pub struct ResultSink {
    entries: Mutex<Vec<ResultEntry>>,
}

impl ResultSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deposits one result entry.
    pub fn push(&self, entry: ResultEntry) {
        recover(self.entries.lock()).push(entry);
    }

    /// Returns the number of collected entries.
    pub fn len(&self) -> usize {
        recover(self.entries.lock()).len()
    }

    /// Returns whether the sink is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes and returns all collected entries.
    pub fn drain(&self) -> Vec<ResultEntry> {
        std::mem::take(&mut *recover(self.entries.lock()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{AgentOutput, Message};
    use crate::runner::ItemKey;
    use serde_json::json;
    use std::sync::Arc;

    fn items(n: usize) -> Vec<WorkItem> {
        (0..n)
            .map(|i| WorkItem::new(ItemKey::from(i), json!(i)))
            .collect()
    }

    #[test]
    fn test_pop_returns_none_when_never_seeded() {
        let queue = WorkQueue::new();
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_pop_drains_seeded_items_then_signals_done() {
        let queue = WorkQueue::new();
        queue.seed(items(2));

        assert!(queue.pop().is_some());
        queue.resolve();
        assert!(queue.pop().is_some());
        queue.resolve();
        assert!(queue.pop().is_none());
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_requeue_keeps_key_pending() {
        let queue = WorkQueue::new();
        queue.seed(items(1));

        let item = queue.pop().expect("seeded item");
        queue.requeue(item.retried());
        assert_eq!(queue.pending(), 1);

        let item = queue.pop().expect("requeued item");
        assert_eq!(item.attempt, 1);
        queue.resolve();
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_close_unblocks_poppers() {
        let queue = Arc::new(WorkQueue::new());
        queue.seed(items(1));
        // Take the only item; a second popper would block on the pending key.
        let _held = queue.pop().expect("seeded item");

        let blocked = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || queue.pop())
        };
        queue.close();
        assert!(blocked.join().expect("popper should not panic").is_none());
    }

    #[test]
    fn test_concurrent_consumers_pop_each_item_exactly_once() {
        let queue = Arc::new(WorkQueue::new());
        queue.seed(items(100));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let queue = Arc::clone(&queue);
            handles.push(std::thread::spawn(move || {
                let mut seen = Vec::new();
                while let Some(item) = queue.pop() {
                    seen.push(item.key);
                    queue.resolve();
                }
                seen
            }));
        }

        let mut all: Vec<ItemKey> = handles
            .into_iter()
            .flat_map(|h| h.join().expect("worker should not panic"))
            .collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 100);
    }

    #[tokio::test]
    async fn test_async_queue_drains_and_signals_done() {
        let queue = AsyncWorkQueue::new();
        queue.seed(items(2));

        assert!(queue.pop().await.is_some());
        queue.resolve();
        assert!(queue.pop().await.is_some());
        queue.resolve();
        assert!(queue.pop().await.is_none());
    }

    #[tokio::test]
    async fn test_async_queue_requeue_and_close() {
        let queue = AsyncWorkQueue::new();
        queue.seed(items(1));

        let item = queue.pop().await.expect("seeded item");
        queue.requeue(item.retried());
        let item = queue.pop().await.expect("requeued item");
        assert_eq!(item.attempt, 1);

        queue.close();
        assert!(queue.pop().await.is_none());
    }

    #[tokio::test]
    async fn test_async_pop_wakes_on_resolve_from_other_task() {
        let queue = Arc::new(AsyncWorkQueue::new());
        queue.seed(items(1));
        let item = queue.pop().await.expect("seeded item");

        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop().await })
        };
        // The waiter is parked on the pending key held by this task.
        tokio::task::yield_now().await;
        drop(item);
        queue.resolve();

        assert!(waiter.await.expect("waiter should not panic").is_none());
    }

    #[test]
    fn test_result_sink_collects_and_drains() {
        let sink = ResultSink::new();
        assert!(sink.is_empty());

        sink.push(ResultEntry::new(
            ItemKey::from(0),
            AgentOutput::single(Message::ai("a")),
        ));
        sink.push(ResultEntry::new(
            ItemKey::from(1),
            AgentOutput::single(Message::ai("b")),
        ));
        assert_eq!(sink.len(), 2);

        let entries = sink.drain();
        assert_eq!(entries.len(), 2);
        assert!(sink.is_empty());
    }
}
