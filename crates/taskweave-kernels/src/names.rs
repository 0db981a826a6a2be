//! Input/output names: literal filenames, glob patterns, and output sentinels

use globset::GlobBuilder;
use std::path::{Path, PathBuf};
use taskweave_core::{Error, Result};
use walkdir::WalkDir;

/// Output name capturing the command's standard output as text.
pub const STDOUT: &str = "STDOUT";

/// Output name capturing a [`DebugInfo`](taskweave_core::DebugInfo) value;
/// declaring it also turns a non-zero exit into data instead of an error.
pub const DEBUGINFO: &str = "DEBUGINFO";

/// How one declared output of a subprocess kernel is resolved after the run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputSlot {
    File(String),
    Glob(String),
    Stdout,
    DebugInfo,
}

impl OutputSlot {
    pub fn parse(name: &str) -> Self {
        match name {
            STDOUT => Self::Stdout,
            DEBUGINFO => Self::DebugInfo,
            n if is_glob(n) => Self::Glob(n.to_string()),
            n => Self::File(n.to_string()),
        }
    }
}

pub fn is_glob(name: &str) -> bool {
    name.contains(['*', '?', '['])
}

/// Filename for element `index` of a list staged under a glob input name.
///
/// The first `*` becomes the index zero-padded to `width` digits, so
/// lexicographic order of the names equals list order; later `*` are dropped.
pub fn expand_glob_name(pattern: &str, index: usize, width: usize) -> Result<String> {
    let Some((head, tail)) = pattern.split_once('*') else {
        return Err(unnumbered(pattern));
    };
    Ok(format!("{}{:0width$}{}", head, index, tail.replace('*', ""), width = width))
}

/// A glob input name must carry a `*` for [`expand_glob_name`] to number.
pub fn check_input_name(name: &str) -> Result<()> {
    if is_glob(name) && !name.contains('*') {
        return Err(unnumbered(name));
    }
    Ok(())
}

fn unnumbered(pattern: &str) -> Error {
    Error::arity(pattern, "a glob input name needs a `*` to number its files")
}

/// Digits needed to number `count` files from zero.
pub fn index_width(count: usize) -> usize {
    count.saturating_sub(1).to_string().len()
}

/// Files under `dir` matching `pattern`, as paths relative to `dir`, in
/// lexicographic order. `*` does not cross directory separators.
pub(crate) fn matching_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let matcher = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| Error::arity(pattern, format!("invalid glob pattern: {}", e)))?
        .compile_matcher();

    let mut found: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let rel = e.path().strip_prefix(dir).ok()?.to_path_buf();
            matcher.is_match(&rel).then_some(rel)
        })
        .collect();

    found.sort();
    tracing::debug!("glob: '{}' → {} matches", pattern, found.len());
    Ok(found)
}
