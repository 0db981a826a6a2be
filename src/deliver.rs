//! Delivering kernel outputs to the caller: artifacts are saved into a
//! destination directory, everything else is handed back for display.

use std::path::{Path, PathBuf};
use taskweave_core::{DebugInfo, Result, Value};
use taskweave_kernels::{expand_glob_name, index_width, is_glob};
use taskweave_staging::{Destination, FileStore, StagedArtifact};

/// What became of one declared output.
#[derive(Debug, Clone)]
pub enum Delivered {
    Saved { output: String, path: PathBuf },
    Text { output: String, text: String },
    Diagnostic { output: String, info: DebugInfo },
    Other { output: String, value: String },
    Empty { output: String },
}

/// Deliver `values`, one per entry of `outputs`, into `dest`.
///
/// A literal output is saved under its own name. Each element of a glob
/// output is saved under the pattern numbered by position.
pub fn deliver_outputs(
    store: &FileStore,
    outputs: &[String],
    values: Vec<Value>,
    dest: &Path,
) -> Result<Vec<Delivered>> {
    let mut delivered = Vec::new();
    for (output, value) in outputs.iter().zip(values) {
        match value {
            Value::List(items) if is_glob(output) => {
                let width = index_width(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    let name = expand_glob_name(output, index, width)
                        .unwrap_or_else(|_| format!("output-{:0width$}", index, width = width));
                    delivered.push(deliver_one(store, output, item, &dest.join(name))?);
                }
            }
            value => delivered.push(deliver_one(store, output, value, &dest.join(output))?),
        }
    }
    Ok(delivered)
}

fn deliver_one(store: &FileStore, output: &str, value: Value, target: &Path) -> Result<Delivered> {
    let output = output.to_string();
    Ok(match value {
        Value::Artifact(artifact) => Delivered::Saved {
            output,
            path: save(store, &artifact, target)?,
        },
        Value::Text(text) => Delivered::Text { output, text },
        Value::Debug(info) => Delivered::Diagnostic { output, info },
        Value::None => Delivered::Empty { output },
        other => Delivered::Other {
            output,
            value: format!("{:?}", other),
        },
    })
}

fn save(store: &FileStore, artifact: &StagedArtifact, target: &Path) -> Result<PathBuf> {
    match store.save(artifact, target)? {
        Destination::Path(path) => Ok(path),
        Destination::Remote(key) => Ok(PathBuf::from(key)),
    }
}
