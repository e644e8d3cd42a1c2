//! Top-level harness: registry plus the single execution entry point.

use tracing::debug;

use crate::agent::{AgentSpec, TranslatorSpec};
use crate::dataset::Dataset;
use crate::error::RunError;
use crate::registry::Registry;
use crate::runner::{self, RunConfig, RunReport, Strategy};

/// Owns a [`Registry`] and runs evaluations from serializable specs.
///
/// The in-process strategies resolve the specs once and share the resulting
/// instances across workers; the process-pool strategy forwards the specs to
/// each worker process, which resolves them against its own registry.
pub struct Harness {
    registry: Registry,
}

impl Harness {
    /// Creates a harness with the built-in registry.
    pub fn new() -> Self {
        Self {
            registry: Registry::with_builtins(),
        }
    }

    /// Creates a harness with a custom registry.
    pub fn with_registry(registry: Registry) -> Self {
        Self { registry }
    }

    /// Returns the registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Returns the registry for registration of additional components.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Runs the configured strategy over the dataset: enumerate keys, drive
    /// the agent with bounded retries, translate, and write every resolved
    /// output back exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] on structural failures (bad config, unresolvable
    /// specs, worker process faults). Per-item failures never surface here;
    /// keys that exhaust their retry budget are reported via
    /// [`RunReport::dropped`] and stay without output.
    pub fn run(
        &self,
        agent_spec: &AgentSpec,
        translator_spec: &TranslatorSpec,
        dataset: &mut dyn Dataset,
        config: &RunConfig,
    ) -> Result<RunReport, RunError> {
        config.validate()?;
        debug!(agent = %agent_spec.name, translator = %translator_spec.name, "Resolving specs");

        match config.strategy {
            Strategy::ProcessPool => {
                // Fail fast on unresolvable specs before spawning anything;
                // worker processes resolve them again on their side.
                self.registry.build_agent(agent_spec)?;
                self.registry.build_translator(translator_spec)?;
                runner::run_process_pool(agent_spec, translator_spec, dataset, config)
            }
            _ => {
                let agent = self.registry.build_agent(agent_spec)?;
                let translator = self.registry.build_translator(translator_spec)?;
                runner::run_with(agent, translator, dataset, config)
            }
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
