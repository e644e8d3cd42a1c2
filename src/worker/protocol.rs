//! Wire format for the process-pool worker protocol.
//!
//! One JSON object per line in each direction: the parent writes a
//! [`WorkRequest`] to the worker's stdin, the worker answers with exactly one
//! [`WorkResponse`] on stdout. The stream ends when the parent closes stdin.
//! Responses echo the key so the parent can verify it got an answer for the
//! item it sent.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::AgentOutput;
use crate::runner::{ItemKey, WorkItem};

/// One work item sent to a worker process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkRequest {
    /// Dataset key of the item.
    pub key: ItemKey,
    /// Opaque input payload.
    pub input: Value,
    /// Zero-based attempt counter, for worker-side logging.
    pub attempt: u32,
}

impl WorkRequest {
    /// Builds a request from a work item.
    pub fn from_item(item: &WorkItem) -> Self {
        Self {
            key: item.key.clone(),
            input: item.input.clone(),
            attempt: item.attempt,
        }
    }

    /// Rebuilds the work item on the worker side.
    pub fn into_item(self) -> WorkItem {
        WorkItem {
            key: self.key,
            input: self.input,
            attempt: self.attempt,
        }
    }
}

/// Outcome of processing one work item in a worker process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkResponse {
    /// Invocation and translation succeeded.
    Ok { key: ItemKey, output: AgentOutput },
    /// The item failed; the parent applies the retry policy.
    Err { key: ItemKey, message: String },
}

impl WorkResponse {
    /// Returns the key this response answers for.
    pub fn key(&self) -> &ItemKey {
        match self {
            WorkResponse::Ok { key, .. } => key,
            WorkResponse::Err { key, .. } => key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{AgentOutput, Message};
    use serde_json::json;

    #[test]
    fn test_request_round_trip() {
        let item = WorkItem::new(ItemKey::from("k1"), json!({"q": 1})).retried();
        let request = WorkRequest::from_item(&item);

        let text = serde_json::to_string(&request).expect("serialization should work");
        let parsed: WorkRequest = serde_json::from_str(&text).expect("deserialization should work");

        assert_eq!(parsed, request);
        assert_eq!(parsed.into_item(), item);
    }

    #[test]
    fn test_response_tags() {
        let ok = WorkResponse::Ok {
            key: ItemKey::from(0),
            output: AgentOutput::single(Message::ai("fine")),
        };
        let value = serde_json::to_value(&ok).expect("serialization should work");
        assert_eq!(value["status"], "ok");

        let err = WorkResponse::Err {
            key: ItemKey::from(1),
            message: "broke".to_string(),
        };
        let value = serde_json::to_value(&err).expect("serialization should work");
        assert_eq!(value["status"], "err");
        assert_eq!(err.key(), &ItemKey::from(1));
    }
}
