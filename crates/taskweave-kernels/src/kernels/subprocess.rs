//! Subprocess kernel: runs a shell command template in a private working
//! directory, staging inputs in before the run and outputs out after it.

use crate::kernel::Kernel;
use crate::names::{
    check_input_name, expand_glob_name, index_width, is_glob, matching_files, OutputSlot,
};
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use taskweave_core::{DebugInfo, Error, ExecutionError, KernelConfig, Outcome, Result, Value};
use taskweave_staging::{FileStore, StagingError};
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct SubprocessKernel {
    name: String,
    template: String,
    inputs: Vec<String>,
    outputs: Vec<String>,
    slots: Vec<OutputSlot>,
    shell: String,
    retain_workdir: bool,
    store: FileStore,
}

impl SubprocessKernel {
    /// A kernel running `template` with `sh -c`, named after the template's
    /// first word. Outputs are staged through a store on the current default
    /// stage point.
    pub fn new(template: impl Into<String>) -> Self {
        let template = template.into();
        let name = template
            .split_whitespace()
            .next()
            .unwrap_or("subprocess")
            .to_string();
        Self {
            name,
            template,
            inputs: Vec::new(),
            outputs: Vec::new(),
            slots: Vec::new(),
            shell: "sh".into(),
            retain_workdir: false,
            store: FileStore::new(),
        }
    }

    /// A kernel with shell and workdir retention taken from config.
    pub fn configured(template: impl Into<String>, config: &KernelConfig) -> Self {
        Self::new(template)
            .shell(config.shell.clone())
            .retain_workdir(config.retain_workdirs)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_inputs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_outputs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs = names.into_iter().map(Into::into).collect();
        self.slots = self.outputs.iter().map(|n| OutputSlot::parse(n)).collect();
        self
    }

    pub fn shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Keep each run's working directory on disk for inspection.
    pub fn retain_workdir(mut self, retain: bool) -> Self {
        self.retain_workdir = retain;
        self
    }

    pub fn with_store(mut self, store: FileStore) -> Self {
        self.store = store;
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    fn captures_debuginfo(&self) -> bool {
        self.slots.contains(&OutputSlot::DebugInfo)
    }

    fn create_workdir(&self) -> Result<Workdir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("taskweave-");
        let created = match self.store.scratch_dir() {
            Some(dir) => {
                std::fs::create_dir_all(dir)
                    .map_err(|e| StagingError::unwritable(dir.display().to_string(), e))?;
                builder.tempdir_in(dir)
            }
            None => builder.tempdir(),
        };
        let dir = created
            .map_err(|e| StagingError::unwritable(self.store.stage_point().to_string(), e))?;
        debug!("kernel {}: workdir {}", self.name, dir.path().display());
        Ok(Workdir {
            dir: Some(dir),
            retain: self.retain_workdir,
        })
    }

    /// Place every argument at its declared input name inside `workdir`.
    fn stage_inputs(&self, workdir: &Path, args: &[Value]) -> Result<()> {
        for (name, value) in self.inputs.iter().zip(args) {
            if is_glob(name) {
                let items = value.as_list().ok_or_else(|| {
                    Error::arity(
                        &self.name,
                        format!("glob input '{}' takes a list, got {}", name, value.kind()),
                    )
                })?;
                let width = index_width(items.len());
                for (index, item) in items.iter().enumerate() {
                    let file = expand_glob_name(name, index, width)?;
                    self.stage_value(item, &workdir.join(file), name)?;
                }
            } else {
                self.stage_value(value, &workdir.join(name), name)?;
            }
        }
        Ok(())
    }

    fn stage_value(&self, value: &Value, dest: &Path, input: &str) -> Result<()> {
        let label = dest.display().to_string();
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StagingError::unwritable(&label, e))?;
        }
        if let Some(src) = value.as_path() {
            std::fs::copy(src, dest)
                .map_err(|e| StagingError::from_read(src.display().to_string(), e))?;
            return Ok(());
        }
        let content = match value {
            Value::Text(s) => s.clone().into_bytes(),
            Value::Bytes(b) => b.clone(),
            Value::Bool(b) => b.to_string().into_bytes(),
            Value::Int(i) => i.to_string().into_bytes(),
            Value::Float(f) => f.to_string().into_bytes(),
            Value::Json(v) => {
                serde_json::to_vec(v).map_err(|e| StagingError::unwritable(&label, e))?
            }
            other => {
                return Err(Error::arity(
                    &self.name,
                    format!("input '{}' cannot be staged from a {} value", input, other.kind()),
                ))
            }
        };
        std::fs::write(dest, content).map_err(|e| StagingError::unwritable(&label, e))?;
        Ok(())
    }

    async fn execute(&self, workdir: &Path) -> Result<DebugInfo> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(&self.template)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ExecutionError::Spawn {
                command: self.template.clone(),
                reason: e.to_string(),
            })?;

        Ok(DebugInfo {
            command: self.template.clone(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            started_at,
            elapsed_ms: clock.elapsed().as_millis() as u64,
        })
    }

    /// Resolve every declared output against the finished working directory.
    fn collect_outputs(&self, workdir: &Path, info: &DebugInfo) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            let value = match slot {
                OutputSlot::Stdout => Value::Text(info.stdout.clone()),
                OutputSlot::DebugInfo => Value::Debug(info.clone()),
                OutputSlot::File(name) => {
                    let path = workdir.join(name);
                    if path.is_file() {
                        Value::Artifact(self.store.load(path)?)
                    } else if info.succeeded() {
                        return Err(StagingError::NotFound(format!(
                            "output '{}' of {} was not produced",
                            name, self.name
                        ))
                        .into());
                    } else {
                        Value::None
                    }
                }
                OutputSlot::Glob(pattern) => {
                    let staged = matching_files(workdir, pattern)?
                        .into_iter()
                        .map(|rel| self.store.load(workdir.join(rel)).map(Value::Artifact))
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    Value::List(staged)
                }
            };
            values.push(value);
        }
        Ok(values)
    }
}

#[async_trait]
impl Kernel for SubprocessKernel {
    fn name(&self) -> &str {
        &self.name
    }

    fn inputs(&self) -> &[String] {
        &self.inputs
    }

    fn outputs(&self) -> &[String] {
        &self.outputs
    }

    fn check_inputs(&self) -> Result<()> {
        self.inputs.iter().try_for_each(|name| check_input_name(name))
    }

    async fn run(&self, args: Vec<Value>) -> Result<Outcome> {
        self.check_arity(args.len())?;
        let workdir = self.create_workdir()?;

        self.stage_inputs(workdir.path(), &args)?;
        drop(args);

        let info = self.execute(workdir.path()).await?;
        if !info.succeeded() && !self.captures_debuginfo() {
            warn!("kernel {}: {}", self.name, info);
            return Err(info.to_error().into());
        }
        info!("kernel {}: {}", self.name, info);

        let values = self.collect_outputs(workdir.path(), &info)?;
        Ok(Outcome::from_outputs(values, self.outputs.len()))
    }
}

/// A run's private working directory. Removed on drop unless retained.
struct Workdir {
    dir: Option<TempDir>,
    retain: bool,
}

impl Workdir {
    fn path(&self) -> &Path {
        self.dir.as_ref().map(TempDir::path).unwrap_or_else(|| Path::new("."))
    }
}

impl Drop for Workdir {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else { return };
        if self.retain {
            let kept: PathBuf = dir.into_path();
            info!("retaining workdir {}", kept.display());
        } else if let Err(e) = dir.close() {
            warn!("failed to remove workdir: {}", e);
        }
    }
}
