//! Agent and translator seams consumed by the execution engine.
//!
//! The engine is agnostic to what an agent actually is: anything that maps an
//! opaque JSON input to an opaque native JSON output. A [`Translator`] then
//! normalizes that native output into an [`AgentOutput`].
//!
//! Agents and translators are named by serializable specs ([`AgentSpec`],
//! [`TranslatorSpec`]) so the process-pool strategy can ship a description to
//! worker processes instead of a live closure; each worker reconstructs its
//! own instance from the spec through the registry.

pub mod builtin;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::message::AgentOutput;

/// Errors an agent invocation can produce.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The underlying agent call failed.
    #[error("{0}")]
    Invocation(String),

    /// The input payload has a shape this agent cannot consume.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Errors produced while translating a native output.
#[derive(Debug, Error)]
pub enum TranslateError {
    /// The native output does not have the shape the translator expects.
    #[error("unexpected native output shape: {0}")]
    MalformedOutput(String),
}

/// A black-box agent callable.
///
/// Implementations must tolerate concurrent invocation from multiple
/// workers; the engine never serializes calls on their behalf. An invocation
/// may block for the full duration of an external computation.
pub trait Agent: Send + Sync {
    /// Invokes the agent on one input, returning its raw native output.
    fn invoke(&self, input: &Value) -> Result<Value, AgentError>;
}

/// Converts a raw native output into a structured [`AgentOutput`].
///
/// Assumed pure and fast relative to the agent call; translation runs on the
/// worker (or event loop) directly, without offloading.
pub trait Translator: Send + Sync {
    /// Translates one native output.
    fn translate(&self, native: Value) -> Result<AgentOutput, TranslateError>;
}

/// Serializable description of an agent: a registry name plus a free-form
/// parameter blob the factory interprets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Registry name of the agent, e.g. `"echo"`.
    pub name: String,
    /// Construction parameters, interpreted by the registered factory.
    #[serde(default)]
    pub params: Value,
}

impl AgentSpec {
    /// Creates a spec with no parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Value::Null,
        }
    }

    /// Sets the construction parameters.
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }
}

/// Serializable description of a translator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatorSpec {
    /// Registry name of the translator, e.g. `"identity"`.
    pub name: String,
    /// Construction parameters, interpreted by the registered factory.
    #[serde(default)]
    pub params: Value,
}

impl TranslatorSpec {
    /// Creates a spec with no parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Value::Null,
        }
    }

    /// Sets the construction parameters.
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_agent_spec_builder() {
        let spec = AgentSpec::new("flaky").with_params(json!({"fail": {"b": 2}}));

        assert_eq!(spec.name, "flaky");
        assert_eq!(spec.params["fail"]["b"], 2);
    }

    #[test]
    fn test_agent_spec_params_default_to_null() {
        let spec: AgentSpec = serde_json::from_str(r#"{"name": "echo"}"#)
            .expect("deserialization should work");

        assert_eq!(spec.name, "echo");
        assert!(spec.params.is_null());
    }

    #[test]
    fn test_translator_spec_round_trip() {
        let spec = TranslatorSpec::new("messages").with_params(json!({"strict": true}));

        let text = serde_json::to_string(&spec).expect("serialization should work");
        let parsed: TranslatorSpec =
            serde_json::from_str(&text).expect("deserialization should work");

        assert_eq!(parsed, spec);
    }
}
