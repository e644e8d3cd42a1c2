//! Work items, result entries and the retry policy.
//!
//! A [`WorkItem`] is one pending unit of work: a dataset key, its input and
//! an attempt counter. Items are created once per dataset key at run start,
//! re-enqueued with an incremented attempt on failure, and destroyed on
//! success or when the retry policy drops them. A [`ResultEntry`] is the
//! terminal success state, created exactly once per resolved key.
//!
//! Both types are serializable because the process-pool strategy sends them
//! across process boundaries.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::AgentOutput;

/// Default maximum number of invocation attempts per key.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Opaque identifier for one dataset item, unique within a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemKey(String);

impl ItemKey {
    /// Creates a key from any string-like value.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<usize> for ItemKey {
    fn from(index: usize) -> Self {
        Self(index.to_string())
    }
}

impl From<&str> for ItemKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for ItemKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl std::fmt::Display for ItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One pending unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Dataset key this item resolves.
    pub key: ItemKey,
    /// Opaque input payload for the agent.
    pub input: Value,
    /// Zero-based attempt counter; incremented on each resubmission.
    pub attempt: u32,
}

impl WorkItem {
    /// Creates a fresh item on its first attempt.
    pub fn new(key: ItemKey, input: Value) -> Self {
        Self {
            key,
            input,
            attempt: 0,
        }
    }

    /// Consumes the item and returns it prepared for the next attempt.
    pub fn retried(mut self) -> Self {
        self.attempt += 1;
        self
    }
}

/// One resolved output, keyed by dataset key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry {
    /// Dataset key this entry resolves.
    pub key: ItemKey,
    /// The translated, structured output.
    pub output: AgentOutput,
}

impl ResultEntry {
    /// Creates a result entry.
    pub fn new(key: ItemKey, output: AgentOutput) -> Self {
        Self { key, output }
    }
}

/// Decision returned by the retry policy after an item failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-enqueue the item with an incremented attempt counter.
    Retry,
    /// Permanently abandon the key. Not a run error.
    Drop,
}

/// Converts a failure plus an attempt count into retry-or-drop.
///
/// A key is invoked at most `max_attempts` times in total.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    /// Creates a policy allowing up to `max_attempts` invocations per key.
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// Decides the fate of an item whose zero-based `attempt` just failed.
    pub fn decide(&self, attempt: u32) -> RetryDecision {
        if attempt + 1 < self.max_attempts {
            RetryDecision::Retry
        } else {
            RetryDecision::Drop
        }
    }

    /// Returns the invocation budget per key.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use serde_json::json;

    #[test]
    fn test_item_key_conversions() {
        assert_eq!(ItemKey::from(3), ItemKey::new("3"));
        assert_eq!(ItemKey::from("k").as_str(), "k");
        assert_eq!(format!("{}", ItemKey::from(7_usize)), "7");
    }

    #[test]
    fn test_work_item_retried() {
        let item = WorkItem::new(ItemKey::from(0), json!("a"));
        assert_eq!(item.attempt, 0);

        let item = item.retried();
        assert_eq!(item.attempt, 1);
        assert_eq!(item.key, ItemKey::from(0));
        assert_eq!(item.input, json!("a"));
    }

    #[test]
    fn test_work_item_serialization() {
        let item = WorkItem::new(ItemKey::from("task-1"), json!({"prompt": "hi"})).retried();

        let text = serde_json::to_string(&item).expect("serialization should work");
        let parsed: WorkItem = serde_json::from_str(&text).expect("deserialization should work");

        assert_eq!(parsed, item);
        assert_eq!(parsed.attempt, 1);
    }

    #[test]
    fn test_result_entry_serialization() {
        let entry = ResultEntry::new(
            ItemKey::from(2),
            AgentOutput::single(Message::ai("answer")),
        );

        let text = serde_json::to_string(&entry).expect("serialization should work");
        let parsed: ResultEntry = serde_json::from_str(&text).expect("deserialization should work");

        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_retry_policy_bounds() {
        let policy = RetryPolicy::new(3);

        // Attempts 0 and 1 failed: two invocations spent, one remains.
        assert_eq!(policy.decide(0), RetryDecision::Retry);
        assert_eq!(policy.decide(1), RetryDecision::Retry);
        // Attempt 2 failed: the third and final invocation is spent.
        assert_eq!(policy.decide(2), RetryDecision::Drop);
    }

    #[test]
    fn test_retry_policy_single_attempt() {
        let policy = RetryPolicy::new(1);
        assert_eq!(policy.decide(0), RetryDecision::Drop);
    }

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), DEFAULT_MAX_ATTEMPTS);
    }
}
