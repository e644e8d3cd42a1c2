//! Name-to-constructor registry for agents and translators.
//!
//! Specs reference components by name; the registry maps each name to a
//! factory that builds an instance from the spec's parameter blob. This is
//! resolved at initialization time, with no runtime reflection, and it is
//! what allows the process-pool strategy to ship plain data to worker
//! processes: every worker resolves the same names against its own registry.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::agent::builtin::{
    ConstantAgent, ConstantParams, EchoAgent, FailAgent, FailParams, FlakyAgent, FlakyParams,
    IdentityTranslator, MessagesTranslator,
};
use crate::agent::{Agent, AgentSpec, Translator, TranslatorSpec};

/// Errors that can occur while resolving specs.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No agent factory is registered under this name.
    #[error("agent '{0}' not found in registry")]
    UnknownAgent(String),

    /// No translator factory is registered under this name.
    #[error("translator '{0}' not found in registry")]
    UnknownTranslator(String),

    /// The factory rejected the spec's parameters.
    #[error("invalid parameters for '{name}': {message}")]
    InvalidParams { name: String, message: String },
}

impl RegistryError {
    fn invalid_params(name: &str, err: impl std::fmt::Display) -> Self {
        RegistryError::InvalidParams {
            name: name.to_string(),
            message: err.to_string(),
        }
    }
}

type AgentFactory = Box<dyn Fn(&Value) -> Result<Arc<dyn Agent>, RegistryError> + Send + Sync>;
type TranslatorFactory =
    Box<dyn Fn(&Value) -> Result<Arc<dyn Translator>, RegistryError> + Send + Sync>;

/// Registry of agent and translator constructors.
pub struct Registry {
    agents: HashMap<String, AgentFactory>,
    translators: HashMap<String, TranslatorFactory>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            agents: HashMap::new(),
            translators: HashMap::new(),
        }
    }

    /// Creates a registry with all built-in agents and translators.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        registry.register_agent("echo", |_params| Ok(Arc::new(EchoAgent)));
        registry.register_agent("constant", |params| {
            let params: ConstantParams = serde_json::from_value(params.clone())
                .map_err(|e| RegistryError::invalid_params("constant", e))?;
            Ok(Arc::new(ConstantAgent::new(params.output)))
        });
        registry.register_agent("flaky", |params| {
            let params: FlakyParams = if params.is_null() {
                FlakyParams::default()
            } else {
                serde_json::from_value(params.clone())
                    .map_err(|e| RegistryError::invalid_params("flaky", e))?
            };
            Ok(Arc::new(FlakyAgent::new(params.fail)))
        });
        registry.register_agent("fail", |params| {
            let params: FailParams = if params.is_null() {
                FailParams::default()
            } else {
                serde_json::from_value(params.clone())
                    .map_err(|e| RegistryError::invalid_params("fail", e))?
            };
            Ok(Arc::new(FailAgent::new(params.message)))
        });

        registry.register_translator("identity", |_params| Ok(Arc::new(IdentityTranslator)));
        registry.register_translator("messages", |_params| Ok(Arc::new(MessagesTranslator)));

        registry
    }

    /// Registers an agent factory under a name, replacing any previous entry.
    pub fn register_agent<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Value) -> Result<Arc<dyn Agent>, RegistryError> + Send + Sync + 'static,
    {
        self.agents.insert(name.into(), Box::new(factory));
    }

    /// Registers a translator factory under a name, replacing any previous
    /// entry.
    pub fn register_translator<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Value) -> Result<Arc<dyn Translator>, RegistryError> + Send + Sync + 'static,
    {
        self.translators.insert(name.into(), Box::new(factory));
    }

    /// Builds an agent from a spec.
    pub fn build_agent(&self, spec: &AgentSpec) -> Result<Arc<dyn Agent>, RegistryError> {
        let factory = self
            .agents
            .get(&spec.name)
            .ok_or_else(|| RegistryError::UnknownAgent(spec.name.clone()))?;
        factory(&spec.params)
    }

    /// Builds a translator from a spec.
    pub fn build_translator(
        &self,
        spec: &TranslatorSpec,
    ) -> Result<Arc<dyn Translator>, RegistryError> {
        let factory = self
            .translators
            .get(&spec.name)
            .ok_or_else(|| RegistryError::UnknownTranslator(spec.name.clone()))?;
        factory(&spec.params)
    }

    /// Returns the registered agent names, sorted.
    pub fn agent_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.agents.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the registered translator names, sorted.
    pub fn translator_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.translators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("agents", &self.agent_names())
            .field("translators", &self.translator_names())
            .finish()
    }
}
