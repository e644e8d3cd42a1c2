//! Standardized message and agent-output types.
//!
//! Translators normalize whatever a native agent produces into an
//! [`AgentOutput`]: a flat list of typed [`Message`]s. Downstream scoring
//! only ever sees these types, never the native output.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One normalized message in an agent transcript.
///
/// The serialized form is tagged with a `type` field, e.g.
/// `{"type": "AIMessage", "content": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    /// System prompt content.
    #[serde(rename = "SystemMessage")]
    System { content: String },

    /// Content authored by the user / task input.
    #[serde(rename = "UserMessage")]
    User { content: String },

    /// Content authored by the agent.
    #[serde(rename = "AIMessage")]
    Ai { content: String },

    /// A tool invocation requested by the agent.
    #[serde(rename = "ToolCallMessage")]
    ToolCall {
        tool_name: String,
        tool_args: Value,
        tool_call_id: String,
    },

    /// The response a tool produced for an earlier call.
    #[serde(rename = "ToolResponseMessage")]
    ToolResponse {
        tool_call_id: String,
        tool_response: String,
    },

    /// A translation-level error marker, terminating the transcript.
    #[serde(rename = "ErrorMessage")]
    Error { content: String },
}

impl Message {
    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    /// Creates an AI message.
    pub fn ai(content: impl Into<String>) -> Self {
        Message::Ai {
            content: content.into(),
        }
    }

    /// Creates a tool-call message.
    pub fn tool_call(
        tool_name: impl Into<String>,
        tool_args: Value,
        tool_call_id: impl Into<String>,
    ) -> Self {
        Message::ToolCall {
            tool_name: tool_name.into(),
            tool_args,
            tool_call_id: tool_call_id.into(),
        }
    }

    /// Creates a tool-response message.
    pub fn tool_response(
        tool_call_id: impl Into<String>,
        tool_response: impl Into<String>,
    ) -> Self {
        Message::ToolResponse {
            tool_call_id: tool_call_id.into(),
            tool_response: tool_response.into(),
        }
    }

    /// Creates an error message.
    pub fn error(content: impl Into<String>) -> Self {
        Message::Error {
            content: content.into(),
        }
    }

    /// Returns whether this is an error message.
    pub fn is_error(&self) -> bool {
        matches!(self, Message::Error { .. })
    }
}

/// Structured output for one dataset item, produced by a translator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentOutput {
    /// The normalized transcript, in native order.
    pub messages: Vec<Message>,
}

impl AgentOutput {
    /// Creates an output from a list of messages.
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Creates an output holding a single message.
    pub fn single(message: Message) -> Self {
        Self {
            messages: vec![message],
        }
    }

    /// Returns whether the transcript is empty.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Returns whether translation flagged an error anywhere in the transcript.
    pub fn has_error(&self) -> bool {
        self.messages.iter().any(Message::is_error)
    }
}
