//! Taskweave configuration
//!
//! Loaded from TOML at startup, falls back to defaults if no config file
//! exists or it fails to parse.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use taskweave_staging::{
    set_default_object_store, set_default_stage_point, FileStore, FsObjectStore, ObjectStore,
    StagePoint,
};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskweaveConfig {
    /// Where artifacts are staged.
    pub staging: StagingConfig,
    /// In-process backend settings.
    pub backend: BackendConfig,
    /// Subprocess kernel settings.
    pub kernels: KernelConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Local directory or `scheme://bucket/prefix`. Unset stages under the system temp dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_point: Option<String>,
    /// Directory standing in for the bucket of a remote stage point.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_store_root: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Maximum number of tasks running at once.
    pub workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Shell used to run command templates (`<shell> -c <template>`).
    pub shell: String,
    /// Keep each run's working directory instead of deleting it.
    pub retain_workdirs: bool,
}

// ============================================================
// Defaults
// ============================================================

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            shell: "sh".into(),
            retain_workdirs: false,
        }
    }
}

// ============================================================
// Loading
// ============================================================

impl TaskweaveConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {}, using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Install the configured stage point, and the object store bound at
    /// `object_store_root`, as the process-wide defaults.
    pub fn apply(&self) -> Result<StagePoint> {
        let stage_point = self.staging.stage_point()?;
        set_default_stage_point(stage_point.clone());
        set_default_object_store(self.staging.object_store());
        Ok(stage_point)
    }
}

impl StagingConfig {
    pub fn stage_point(&self) -> Result<StagePoint> {
        match &self.stage_point {
            Some(raw) => raw
                .parse()
                .map_err(|e| Error::Config(format!("staging.stage_point: {}", e))),
            None => Ok(StagePoint::Temp),
        }
    }

    /// A file store on the configured stage point, bound to the configured
    /// object store root when there is one.
    pub fn file_store(&self) -> Result<FileStore> {
        let store = FileStore::with_stage_point(self.stage_point()?);
        Ok(match self.object_store() {
            Some(object_store) => store.with_object_store(object_store),
            None => store,
        })
    }

    pub fn object_store(&self) -> Option<Arc<dyn ObjectStore>> {
        self.object_store_root
            .as_ref()
            .map(|root| Arc::new(FsObjectStore::new(root)) as Arc<dyn ObjectStore>)
    }
}
