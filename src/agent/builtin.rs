//! Built-in agents and translators.
//!
//! These cover the harness's own needs: wiring checks (`echo`, `constant`),
//! deterministic failure injection for exercising the retry machinery
//! (`flaky`, `fail`), and the two standard translators (`identity`,
//! `messages`). Real benchmark agents are registered by downstream crates.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Deserialize;
use serde_json::Value;

use super::{Agent, AgentError, TranslateError, Translator};
use crate::message::{AgentOutput, Message};

/// Agent that returns its input unchanged.
#[derive(Debug, Default)]
pub struct EchoAgent;

impl Agent for EchoAgent {
    fn invoke(&self, input: &Value) -> Result<Value, AgentError> {
        Ok(input.clone())
    }
}

/// Parameters for [`ConstantAgent`].
#[derive(Debug, Deserialize)]
pub struct ConstantParams {
    /// The native output returned for every input.
    pub output: Value,
}

/// Agent that returns a fixed native output regardless of input.
#[derive(Debug)]
pub struct ConstantAgent {
    output: Value,
}

impl ConstantAgent {
    /// Creates an agent returning `output` for every invocation.
    pub fn new(output: Value) -> Self {
        Self { output }
    }
}

impl Agent for ConstantAgent {
    fn invoke(&self, _input: &Value) -> Result<Value, AgentError> {
        Ok(self.output.clone())
    }
}

/// Parameters for [`FlakyAgent`].
#[derive(Debug, Default, Deserialize)]
pub struct FlakyParams {
    /// Map from input (string form) to the number of invocations that fail
    /// before the agent starts succeeding for that input.
    #[serde(default)]
    pub fail: HashMap<String, u32>,
}

/// Agent that fails a configured number of times per input, then echoes.
///
/// Deterministic as long as no input is invoked concurrently with itself,
/// which the engine guarantees per key.
#[derive(Debug)]
pub struct FlakyAgent {
    fail: HashMap<String, u32>,
    seen: Mutex<HashMap<String, u32>>,
}

impl FlakyAgent {
    /// Creates an agent from per-input failure counts.
    pub fn new(fail: HashMap<String, u32>) -> Self {
        Self {
            fail,
            seen: Mutex::new(HashMap::new()),
        }
    }

    fn record_invocation(&self, input: &str) -> u32 {
        let mut seen = self.seen.lock().unwrap_or_else(|p| p.into_inner());
        let count = seen.entry(input.to_string()).or_insert(0);
        let before = *count;
        *count += 1;
        before
    }
}

impl Agent for FlakyAgent {
    fn invoke(&self, input: &Value) -> Result<Value, AgentError> {
        let text = match input {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let invoked_before = self.record_invocation(&text);
        let budget = self.fail.get(&text).copied().unwrap_or(0);

        if invoked_before < budget {
            return Err(AgentError::Invocation(format!(
                "injected failure {} of {} for input '{}'",
                invoked_before + 1,
                budget,
                text
            )));
        }
        Ok(input.clone())
    }
}

/// Parameters for [`FailAgent`].
#[derive(Debug, Deserialize)]
pub struct FailParams {
    /// Error message reported on every invocation.
    #[serde(default = "FailParams::default_message")]
    pub message: String,
}

impl FailParams {
    fn default_message() -> String {
        "unconditional failure".to_string()
    }
}

impl Default for FailParams {
    fn default() -> Self {
        Self {
            message: Self::default_message(),
        }
    }
}

/// Agent that fails every invocation.
#[derive(Debug)]
pub struct FailAgent {
    message: String,
}

impl FailAgent {
    /// Creates an agent failing with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Agent for FailAgent {
    fn invoke(&self, _input: &Value) -> Result<Value, AgentError> {
        Err(AgentError::Invocation(self.message.clone()))
    }
}

/// Translator that wraps the whole native output in a single AI message.
#[derive(Debug, Default)]
pub struct IdentityTranslator;

impl Translator for IdentityTranslator {
    fn translate(&self, native: Value) -> Result<AgentOutput, TranslateError> {
        let content = match native {
            Value::String(s) => s,
            other => other.to_string(),
        };
        Ok(AgentOutput::single(Message::ai(content)))
    }
}

/// Translator for native outputs shaped as `{"messages": [...]}` transcripts.
///
/// Each entry carries a `role` and `content`; assistant entries may carry
/// `tool_calls` and tool entries a `tool_call_id`. System entries are
/// skipped. An unrecognized role produces a terminal error message and stops
/// translation, leaving the error visible in the transcript.
#[derive(Debug, Default)]
pub struct MessagesTranslator;

impl MessagesTranslator {
    fn text_field(raw: &Value, field: &str) -> String {
        raw.get(field)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }
}

impl Translator for MessagesTranslator {
    fn translate(&self, native: Value) -> Result<AgentOutput, TranslateError> {
        let entries = native
            .get("messages")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                TranslateError::MalformedOutput("missing 'messages' array".to_string())
            })?;

        let mut messages = Vec::new();
        for raw in entries {
            let role = raw.get("role").and_then(Value::as_str).unwrap_or("");
            let content = Self::text_field(raw, "content");

            match role {
                "system" => continue,
                "assistant" | "ai" => {
                    messages.push(Message::ai(content));
                    if let Some(calls) = raw.get("tool_calls").and_then(Value::as_array) {
                        for call in calls {
                            messages.push(Message::tool_call(
                                Self::text_field(call, "name"),
                                call.get("args").cloned().unwrap_or(Value::Null),
                                Self::text_field(call, "id"),
                            ));
                        }
                    }
                }
                "user" | "human" => messages.push(Message::user(content)),
                "tool" => messages.push(Message::tool_response(
                    Self::text_field(raw, "tool_call_id"),
                    content,
                )),
                other => {
                    messages.push(Message::error(format!(
                        "unrecognized message role '{other}' in native output"
                    )));
                    break;
                }
            }
        }

        Ok(AgentOutput::new(messages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_echo_agent() {
        let agent = EchoAgent;
        let out = agent.invoke(&json!("hello")).expect("echo never fails");
        assert_eq!(out, json!("hello"));
    }

    #[test]
    fn test_constant_agent() {
        let agent = ConstantAgent::new(json!({"answer": 42}));
        let out = agent.invoke(&json!("ignored")).expect("constant never fails");
        assert_eq!(out["answer"], 42);
    }

    #[test]
    fn test_flaky_agent_fails_then_succeeds() {
        let mut fail = HashMap::new();
        fail.insert("b".to_string(), 2);
        let agent = FlakyAgent::new(fail);

        assert!(agent.invoke(&json!("b")).is_err());
        assert!(agent.invoke(&json!("b")).is_err());
        assert!(agent.invoke(&json!("b")).is_ok());

        // Unconfigured inputs never fail.
        assert!(agent.invoke(&json!("a")).is_ok());
    }

    #[test]
    fn test_flaky_agent_counts_per_input() {
        let mut fail = HashMap::new();
        fail.insert("x".to_string(), 1);
        fail.insert("y".to_string(), 1);
        let agent = FlakyAgent::new(fail);

        assert!(agent.invoke(&json!("x")).is_err());
        assert!(agent.invoke(&json!("y")).is_err());
        assert!(agent.invoke(&json!("x")).is_ok());
        assert!(agent.invoke(&json!("y")).is_ok());
    }

    #[test]
    fn test_fail_agent() {
        let agent = FailAgent::new("nope");
        let err = agent.invoke(&json!("anything")).unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_identity_translator_string() {
        let translator = IdentityTranslator;
        let out = translator
            .translate(json!("plain answer"))
            .expect("translation should work");

        assert_eq!(out.messages, vec![Message::ai("plain answer")]);
    }

    #[test]
    fn test_identity_translator_object() {
        let translator = IdentityTranslator;
        let out = translator
            .translate(json!({"k": 1}))
            .expect("translation should work");

        assert_eq!(out.messages.len(), 1);
        assert!(matches!(&out.messages[0], Message::Ai { content } if content.contains("\"k\"")));
    }

    #[test]
    fn test_messages_translator_transcript() {
        let translator = MessagesTranslator;
        let native = json!({
            "messages": [
                {"role": "system", "content": "be helpful"},
                {"role": "user", "content": "what is 2+2"},
                {"role": "assistant", "content": "let me check", "tool_calls": [
                    {"name": "calc", "args": {"expr": "2+2"}, "id": "call-1"}
                ]},
                {"role": "tool", "tool_call_id": "call-1", "content": "4"},
                {"role": "assistant", "content": "4"}
            ]
        });

        let out = translator.translate(native).expect("translation should work");

        assert_eq!(
            out.messages,
            vec![
                Message::user("what is 2+2"),
                Message::ai("let me check"),
                Message::tool_call("calc", json!({"expr": "2+2"}), "call-1"),
                Message::tool_response("call-1", "4"),
                Message::ai("4"),
            ]
        );
        assert!(!out.has_error());
    }

    #[test]
    fn test_messages_translator_unknown_role_terminates() {
        let translator = MessagesTranslator;
        let native = json!({
            "messages": [
                {"role": "user", "content": "q"},
                {"role": "alien", "content": "??"},
                {"role": "assistant", "content": "never reached"}
            ]
        });

        let out = translator.translate(native).expect("translation should work");

        assert_eq!(out.messages.len(), 2);
        assert!(out.messages[1].is_error());
        assert!(out.has_error());
    }

    #[test]
    fn test_messages_translator_rejects_missing_messages() {
        let translator = MessagesTranslator;
        let err = translator.translate(json!({"data": []})).unwrap_err();
        assert!(err.to_string().contains("messages"));
    }
}
