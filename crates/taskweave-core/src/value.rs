//! Values passed into and out of kernels, and the shape of a kernel's result.

use crate::diagnostic::DebugInfo;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use taskweave_staging::StagedArtifact;

/// A kernel argument or result.
///
/// Cloning is cheap for artifacts (they share one staged copy) and deep for
/// everything else.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Path(PathBuf),
    Artifact(StagedArtifact),
    List(Vec<Value>),
    /// The combined result of a multi-output kernel, one entry per output.
    Tuple(Vec<Value>),
    Debug(DebugInfo),
    Json(serde_json::Value),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Path(_) => "path",
            Self::Artifact(_) => "artifact",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::Debug(_) => "debuginfo",
            Self::Json(_) => "json",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_artifact(&self) -> Option<&StagedArtifact> {
        match self {
            Self::Artifact(a) => Some(a),
            _ => None,
        }
    }

    pub fn into_artifact(self) -> Option<StagedArtifact> {
        match self {
            Self::Artifact(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_debug(&self) -> Option<&DebugInfo> {
        match self {
            Self::Debug(info) => Some(info),
            _ => None,
        }
    }

    /// Filesystem path behind a `Path` or `Artifact` value.
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Path(p) => Some(p),
            Self::Artifact(a) => Some(a.path()),
            _ => None,
        }
    }

    /// Replace artifacts (also inside lists) with their current local path,
    /// for code that expects plain path arguments. The caller keeps the
    /// original value alive for as long as the paths are used.
    pub fn coerce_path(&self) -> Value {
        match self {
            Self::Artifact(a) => Self::Path(a.path().to_path_buf()),
            Self::List(items) => Self::List(items.iter().map(Value::coerce_path).collect()),
            other => other.clone(),
        }
    }

    /// Element `index` of a tuple or list value.
    pub fn element(&self, index: usize) -> Result<Value> {
        let items = match self {
            Self::Tuple(items) | Self::List(items) => items,
            other => {
                return Err(Error::arity(
                    "unpack",
                    format!("cannot index into a {} value", other.kind()),
                ))
            }
        };
        items.get(index).cloned().ok_or_else(|| {
            Error::arity(
                "unpack",
                format!("index {} out of range for {} elements", index, items.len()),
            )
        })
    }

    /// Take element `index` of a tuple or list value without cloning the rest.
    pub fn into_element(self, index: usize) -> Result<Value> {
        match self {
            Self::Tuple(mut items) | Self::List(mut items) if index < items.len() => {
                Ok(items.swap_remove(index))
            }
            other => other.element(index),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

impl From<PathBuf> for Value {
    fn from(p: PathBuf) -> Self {
        Self::Path(p)
    }
}

impl From<&Path> for Value {
    fn from(p: &Path) -> Self {
        Self::Path(p.to_path_buf())
    }
}

impl From<StagedArtifact> for Value {
    fn from(a: StagedArtifact) -> Self {
        Self::Artifact(a)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<Vec<StagedArtifact>> for Value {
    fn from(items: Vec<StagedArtifact>) -> Self {
        Self::List(items.into_iter().map(Value::Artifact).collect())
    }
}

impl From<DebugInfo> for Value {
    fn from(info: DebugInfo) -> Self {
        Self::Debug(info)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

/// The result of one kernel run, shaped by the kernel's declared outputs:
/// exactly one declared output gives `Single`, any other count gives
/// `Multiple` with one entry per output in declaration order.
#[derive(Clone, Debug)]
pub enum Outcome {
    Single(Value),
    Multiple(Vec<Value>),
}

impl Outcome {
    /// Shape per-output values collected in declaration order.
    pub fn from_outputs(mut values: Vec<Value>, declared: usize) -> Self {
        if declared == 1 && values.len() == 1 {
            Self::Single(values.pop().unwrap_or_default())
        } else {
            Self::Multiple(values)
        }
    }

    /// Shape a callable's raw return value. With several declared outputs the
    /// value must be a tuple of matching length.
    pub fn from_return(value: Value, declared: usize, context: &str) -> Result<Self> {
        if declared == 1 {
            return Ok(Self::Single(value));
        }
        match value {
            Value::Tuple(items) if items.len() == declared => Ok(Self::Multiple(items)),
            Value::Tuple(items) => Err(Error::count_mismatch(context, "outputs", declared, items.len())),
            other => Err(Error::arity(
                context,
                format!("expected a tuple of {} outputs, got {}", declared, other.kind()),
            )),
        }
    }

    /// Rebuild an outcome from the single value a backend carries.
    pub fn from_value(value: Value, declared: usize) -> Result<Self> {
        Self::from_return(value, declared, "result")
    }

    /// Collapse to one transferable value: `Single(v)` is `v`, `Multiple` is a tuple.
    pub fn into_value(self) -> Value {
        match self {
            Self::Single(v) => v,
            Self::Multiple(items) => Value::Tuple(items),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Multiple(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn single(self) -> Option<Value> {
        match self {
            Self::Single(v) => Some(v),
            Self::Multiple(_) => None,
        }
    }

    pub fn into_vec(self) -> Vec<Value> {
        match self {
            Self::Single(v) => vec![v],
            Self::Multiple(items) => items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_out_of_range_is_arity() {
        let v = Value::Tuple(vec![Value::Int(1)]);
        assert_eq!(v.element(0).unwrap().as_int(), Some(1));
        assert!(matches!(v.element(1), Err(Error::Arity { .. })));
        assert!(matches!(Value::Int(3).element(0), Err(Error::Arity { .. })));
    }

    #[test]
    fn into_element_takes_one() {
        let v = Value::Tuple(vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(v.into_element(1).unwrap().as_text(), Some("b"));
    }

    #[test]
    fn single_output_passes_value_through() {
        let tuple = Value::Tuple(vec![1.into(), 2.into()]);
        let outcome = Outcome::from_return(tuple, 1, "k").unwrap();
        assert!(matches!(outcome.single(), Some(Value::Tuple(_))));
    }
}
