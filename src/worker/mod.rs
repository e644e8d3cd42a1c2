//! Worker-process side of the process-pool strategy.
//!
//! A worker is a stateless executor: it rebuilds its agent and translator
//! from the specs it was launched with, then answers [`WorkRequest`]s from
//! stdin with [`WorkResponse`]s on stdout, one JSON line each, until stdin
//! closes. Retry decisions stay with the parent; the worker only reports
//! item outcomes.
//!
//! The shipping binary serves this protocol through its hidden `worker`
//! subcommand. Downstream crates embedding custom agents expose the same
//! protocol from their own binary by calling [`serve`] with their registry.

pub mod protocol;

use std::io::{self, BufRead, Write};

use thiserror::Error;
use tracing::debug;

use crate::agent::{Agent, AgentSpec, Translator, TranslatorSpec};
use crate::registry::{Registry, RegistryError};
use crate::runner::invoke_and_translate;

pub use protocol::{WorkRequest, WorkResponse};

/// Errors that can occur while serving the worker protocol.
///
/// All of these are structural: an item failure is a normal
/// [`WorkResponse::Err`], not a `WorkerError`.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The agent or translator spec could not be resolved.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// A request line could not be decoded.
    #[error("failed to decode work request: {0}")]
    Decode(serde_json::Error),

    /// A response could not be encoded.
    #[error("failed to encode work response: {0}")]
    Encode(serde_json::Error),

    /// IO error on the protocol streams.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serves the worker protocol over this process's stdin/stdout until EOF.
///
/// # Errors
///
/// Returns [`WorkerError`] on spec resolution, protocol or IO faults. The
/// parent treats a worker exiting with an error as a structural run failure.
pub fn serve(
    registry: &Registry,
    agent_spec: &AgentSpec,
    translator_spec: &TranslatorSpec,
) -> Result<(), WorkerError> {
    let agent = registry.build_agent(agent_spec)?;
    let translator = registry.build_translator(translator_spec)?;

    let stdin = io::stdin().lock();
    let stdout = io::stdout().lock();
    serve_io(agent.as_ref(), translator.as_ref(), stdin, stdout)
}

/// Protocol loop over arbitrary streams, separated from [`serve`] for
/// testability.
pub fn serve_io(
    agent: &dyn Agent,
    translator: &dyn Translator,
    reader: impl BufRead,
    mut writer: impl Write,
) -> Result<(), WorkerError> {
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let request: WorkRequest =
            serde_json::from_str(&line).map_err(WorkerError::Decode)?;
        debug!(key = %request.key, attempt = request.attempt, "Worker processing item");

        let key = request.key.clone();
        let item = request.into_item();
        let response = match invoke_and_translate(agent, translator, &item) {
            Ok(output) => WorkResponse::Ok { key, output },
            Err(err) => WorkResponse::Err {
                key,
                message: err.to_string(),
            },
        };

        serde_json::to_writer(&mut writer, &response).map_err(WorkerError::Encode)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::builtin::{EchoAgent, FailAgent, IdentityTranslator};
    use std::io::Cursor;

    fn serve_lines(agent: &dyn Agent, input: &str) -> Vec<WorkResponse> {
        let mut output = Vec::new();
        serve_io(
            agent,
            &IdentityTranslator,
            Cursor::new(input.to_string()),
            &mut output,
        )
        .expect("serve should succeed");

        String::from_utf8(output)
            .expect("valid utf8")
            .lines()
            .map(|l| serde_json::from_str(l).expect("valid response"))
            .collect()
    }

    #[test]
    fn test_serve_answers_each_request() {
        let responses = serve_lines(
            &EchoAgent,
            "{\"key\":\"0\",\"input\":\"a\",\"attempt\":0}\n\
             {\"key\":\"1\",\"input\":\"b\",\"attempt\":0}\n",
        );

        assert_eq!(responses.len(), 2);
        assert!(matches!(&responses[0], WorkResponse::Ok { key, .. } if key.as_str() == "0"));
        assert!(matches!(&responses[1], WorkResponse::Ok { key, .. } if key.as_str() == "1"));
    }

    #[test]
    fn test_serve_reports_item_failures_inline() {
        let responses = serve_lines(
            &FailAgent::new("no dice"),
            "{\"key\":\"3\",\"input\":\"a\",\"attempt\":1}\n",
        );

        assert_eq!(responses.len(), 1);
        assert!(
            matches!(&responses[0], WorkResponse::Err { key, message }
                if key.as_str() == "3" && message.contains("no dice"))
        );
    }

    #[test]
    fn test_serve_skips_blank_lines() {
        let responses = serve_lines(&EchoAgent, "\n{\"key\":\"0\",\"input\":1,\"attempt\":0}\n\n");
        assert_eq!(responses.len(), 1);
    }

    #[test]
    fn test_serve_rejects_garbage() {
        let mut output = Vec::new();
        let err = serve_io(
            &EchoAgent,
            &IdentityTranslator,
            Cursor::new("not json\n".to_string()),
            &mut output,
        )
        .unwrap_err();

        assert!(matches!(err, WorkerError::Decode(_)));
    }
}
