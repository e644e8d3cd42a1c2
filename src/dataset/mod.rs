//! Dataset abstraction and the two bundled implementations.
//!
//! The engine touches datasets through a narrow seam: enumerate keys once at
//! run start, fetch each key's input, and write each resolved output back
//! exactly once during the single-threaded drain phase. Targets and stored
//! outputs exist for downstream evaluation and are never read by the engine
//! itself.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::message::AgentOutput;
use crate::runner::ItemKey;

/// Errors that can occur while loading or persisting datasets.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// IO error while reading or writing a dataset file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A dataset line is not valid JSON.
    #[error("invalid JSON on line {line}: {source}")]
    InvalidJson {
        line: usize,
        source: serde_json::Error,
    },

    /// A dataset record is missing a required field.
    #[error("record on line {line} is missing field '{field}'")]
    MissingField { line: usize, field: String },

    /// Encoding a result line failed.
    #[error("failed to encode result line {line}: {source}")]
    EncodeFailed {
        line: usize,
        source: serde_json::Error,
    },
}

/// A keyed dataset of inputs, optional targets, and write-back output slots.
pub trait Dataset {
    /// Returns every key in the dataset. Called once at run start.
    fn keys(&self) -> Vec<ItemKey>;

    /// Returns the input for a key, if the key exists.
    fn input(&self, key: &ItemKey) -> Option<Value>;

    /// Returns the evaluation target for a key, if one exists.
    fn target(&self, key: &ItemKey) -> Option<Value>;

    /// Stores the resolved output for a key. Called at most once per key.
    fn set_output(&mut self, key: ItemKey, output: AgentOutput);

    /// Returns the stored output for a key, if the key was resolved.
    fn output(&self, key: &ItemKey) -> Option<&AgentOutput>;
}

/// In-memory dataset keyed by item index.
#[derive(Debug, Default)]
pub struct MemoryDataset {
    inputs: Vec<Value>,
    targets: Vec<Value>,
    outputs: HashMap<ItemKey, AgentOutput>,
}

impl MemoryDataset {
    /// Creates a dataset from inputs, with no targets.
    pub fn from_inputs(inputs: Vec<Value>) -> Self {
        Self {
            inputs,
            targets: Vec::new(),
            outputs: HashMap::new(),
        }
    }

    /// Sets the targets, one per input.
    pub fn with_targets(mut self, targets: Vec<Value>) -> Self {
        self.targets = targets;
        self
    }

    /// Returns the number of items.
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    /// Returns whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    fn index_of(key: &ItemKey) -> Option<usize> {
        key.as_str().parse().ok()
    }
}

impl Dataset for MemoryDataset {
    fn keys(&self) -> Vec<ItemKey> {
        (0..self.inputs.len()).map(ItemKey::from).collect()
    }

    fn input(&self, key: &ItemKey) -> Option<Value> {
        Self::index_of(key).and_then(|i| self.inputs.get(i)).cloned()
    }

    fn target(&self, key: &ItemKey) -> Option<Value> {
        Self::index_of(key).and_then(|i| self.targets.get(i)).cloned()
    }

    fn set_output(&mut self, key: ItemKey, output: AgentOutput) {
        self.outputs.insert(key, output);
    }

    fn output(&self, key: &ItemKey) -> Option<&AgentOutput> {
        self.outputs.get(key)
    }
}

/// One record of a JSONL dataset file.
#[derive(Debug, Clone)]
struct JsonlRecord {
    input: Value,
    target: Option<Value>,
}

/// Dataset backed by a JSONL file: one `{"input": ..., "target": ...}`
/// object per line, keyed by line index. Resolved outputs are written to a
/// results JSONL file via [`JsonlDataset::write_outputs`].
#[derive(Debug)]
pub struct JsonlDataset {
    path: PathBuf,
    records: Vec<JsonlRecord>,
    outputs: HashMap<ItemKey, AgentOutput>,
}

#[derive(Debug, Serialize)]
struct JsonlResultLine<'a> {
    key: &'a ItemKey,
    input: &'a Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<&'a Value>,
    /// `null` for keys dropped after exhausting retries.
    output: Option<&'a AgentOutput>,
}

impl JsonlDataset {
    /// Loads a dataset from a JSONL file.
    ///
    /// Blank lines are skipped. Every record must carry an `input` field;
    /// `target` is optional.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref().to_path_buf();
        let text = fs::read_to_string(&path)?;

        let mut records = Vec::new();
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let value: Value =
                serde_json::from_str(line).map_err(|source| DatasetError::InvalidJson {
                    line: index + 1,
                    source,
                })?;
            let input = value
                .get("input")
                .cloned()
                .ok_or_else(|| DatasetError::MissingField {
                    line: index + 1,
                    field: "input".to_string(),
                })?;
            let target = value.get("target").cloned();
            records.push(JsonlRecord { input, target });
        }

        Ok(Self {
            path,
            records,
            outputs: HashMap::new(),
        })
    }

    /// Returns the path this dataset was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of items.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Writes one result line per record, with `output: null` for dropped
    /// keys, making silent drops visible in the artifact.
    pub fn write_outputs(&self, path: impl AsRef<Path>) -> Result<(), DatasetError> {
        let mut file = fs::File::create(path)?;
        for (index, record) in self.records.iter().enumerate() {
            let key = ItemKey::from(index);
            let line = JsonlResultLine {
                output: self.outputs.get(&key),
                key: &key,
                input: &record.input,
                target: record.target.as_ref(),
            };
            serde_json::to_writer(&mut file, &line).map_err(|source| {
                DatasetError::EncodeFailed {
                    line: index + 1,
                    source,
                }
            })?;
            file.write_all(b"\n")?;
        }
        Ok(())
    }
}

impl Dataset for JsonlDataset {
    fn keys(&self) -> Vec<ItemKey> {
        (0..self.records.len()).map(ItemKey::from).collect()
    }

    fn input(&self, key: &ItemKey) -> Option<Value> {
        let index: usize = key.as_str().parse().ok()?;
        self.records.get(index).map(|r| r.input.clone())
    }

    fn target(&self, key: &ItemKey) -> Option<Value> {
        let index: usize = key.as_str().parse().ok()?;
        self.records.get(index).and_then(|r| r.target.clone())
    }

    fn set_output(&mut self, key: ItemKey, output: AgentOutput) {
        self.outputs.insert(key, output);
    }

    fn output(&self, key: &ItemKey) -> Option<&AgentOutput> {
        self.outputs.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use serde_json::json;
    use std::io::Write as _;

    #[test]
    fn test_memory_dataset_keys_and_inputs() {
        let dataset = MemoryDataset::from_inputs(vec![json!("a"), json!("b")])
            .with_targets(vec![json!(1), json!(2)]);

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.keys(), vec![ItemKey::from(0), ItemKey::from(1)]);
        assert_eq!(dataset.input(&ItemKey::from(1)), Some(json!("b")));
        assert_eq!(dataset.target(&ItemKey::from(0)), Some(json!(1)));
        assert_eq!(dataset.input(&ItemKey::from(9)), None);
    }

    #[test]
    fn test_memory_dataset_outputs() {
        let mut dataset = MemoryDataset::from_inputs(vec![json!("a")]);
        let key = ItemKey::from(0);

        assert!(dataset.output(&key).is_none());
        dataset.set_output(key.clone(), AgentOutput::single(Message::ai("out")));
        assert_eq!(
            dataset.output(&key).map(|o| o.messages.len()),
            Some(1)
        );
    }

    #[test]
    fn test_jsonl_dataset_load_and_write() {
        let dir = tempfile::tempdir().expect("tempdir should work");
        let input_path = dir.path().join("data.jsonl");
        let output_path = dir.path().join("results.jsonl");

        let mut file = fs::File::create(&input_path).expect("create should work");
        writeln!(file, r#"{{"input": "a", "target": "A"}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"input": "b"}}"#).unwrap();

        let mut dataset = JsonlDataset::load(&input_path).expect("load should work");
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.input(&ItemKey::from(0)), Some(json!("a")));
        assert_eq!(dataset.target(&ItemKey::from(0)), Some(json!("A")));
        assert_eq!(dataset.target(&ItemKey::from(1)), None);

        dataset.set_output(ItemKey::from(0), AgentOutput::single(Message::ai("A!")));
        dataset.write_outputs(&output_path).expect("write should work");

        let written = fs::read_to_string(&output_path).expect("read should work");
        let lines: Vec<Value> = written
            .lines()
            .map(|l| serde_json::from_str(l).expect("valid JSON"))
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["key"], "0");
        assert_eq!(lines[0]["output"]["messages"][0]["type"], "AIMessage");
        // Key 1 was never resolved; the drop is visible as a null output.
        assert_eq!(lines[1]["output"], Value::Null);
    }

    #[test]
    fn test_jsonl_dataset_rejects_missing_input() {
        let dir = tempfile::tempdir().expect("tempdir should work");
        let path = dir.path().join("bad.jsonl");
        fs::write(&path, "{\"target\": 1}\n").expect("write should work");

        let err = JsonlDataset::load(&path).unwrap_err();
        assert!(matches!(err, DatasetError::MissingField { line: 1, .. }));
    }

    #[test]
    fn test_jsonl_dataset_rejects_invalid_json() {
        let dir = tempfile::tempdir().expect("tempdir should work");
        let path = dir.path().join("bad.jsonl");
        fs::write(&path, "{\"input\": \"a\"}\nnot json\n").expect("write should work");

        let err = JsonlDataset::load(&path).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidJson { line: 2, .. }));
    }
}
