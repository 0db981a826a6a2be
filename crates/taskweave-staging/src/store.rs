//! File store: loads sources into staged artifacts and saves them back out.

use crate::artifact::{RemoteCopy, StagedArtifact};
use crate::error::{StagingError, StagingResult};
use crate::object_store::ObjectStore;
use crate::stage_point::{default_object_store, default_stage_point, StagePoint};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Where content to be staged comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    /// A file on the local filesystem.
    Path(PathBuf),
    /// Raw in-memory content.
    Data(Vec<u8>),
    /// A key in the store's bound object store.
    Remote(String),
}

impl Source {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Data(s.into().into_bytes())
    }

    fn describe(&self) -> String {
        match self {
            Self::Path(p) => p.display().to_string(),
            Self::Data(bytes) => format!("<{} bytes in memory>", bytes.len()),
            Self::Remote(key) => format!("remote:{key}"),
        }
    }

    /// File extension to keep on the staged copy, with its leading dot.
    fn suffix(&self) -> String {
        let ext = match self {
            Self::Path(p) => p.extension(),
            Self::Remote(key) => Path::new(key).extension(),
            Self::Data(_) => None,
        };
        ext.map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default()
    }
}

impl From<PathBuf> for Source {
    fn from(p: PathBuf) -> Self {
        Self::Path(p)
    }
}

impl From<&Path> for Source {
    fn from(p: &Path) -> Self {
        Self::Path(p.to_path_buf())
    }
}

impl From<&StagedArtifact> for Source {
    fn from(a: &StagedArtifact) -> Self {
        Self::Path(a.path().to_path_buf())
    }
}

/// Where a saved artifact goes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Destination {
    Path(PathBuf),
    Remote(String),
}

impl From<PathBuf> for Destination {
    fn from(p: PathBuf) -> Self {
        Self::Path(p)
    }
}

impl From<&Path> for Destination {
    fn from(p: &Path) -> Self {
        Self::Path(p.to_path_buf())
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path(p) => write!(f, "{}", p.display()),
            Self::Remote(key) => write!(f, "remote:{key}"),
        }
    }
}

/// Protocol-aware loader/saver of staged artifacts.
///
/// Stateless apart from its stage point and, for remote stage points, the
/// object store the stage point resolves to.
#[derive(Clone)]
pub struct FileStore {
    stage_point: StagePoint,
    object_store: Option<Arc<dyn ObjectStore>>,
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FileStore {
    /// A store using the process-wide default stage point and object store
    /// as of now.
    pub fn new() -> Self {
        Self {
            stage_point: default_stage_point(),
            object_store: default_object_store(),
        }
    }

    pub fn with_stage_point(stage_point: StagePoint) -> Self {
        Self {
            stage_point,
            object_store: None,
        }
    }

    /// Bind the object store used for remote stage points, remote sources
    /// and remote destinations.
    pub fn with_object_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.object_store = Some(store);
        self
    }

    pub fn stage_point(&self) -> &StagePoint {
        &self.stage_point
    }

    /// Local directory staged files are written under, if one is configured.
    pub fn scratch_dir(&self) -> Option<&Path> {
        match &self.stage_point {
            StagePoint::Local(dir) => Some(dir),
            _ => None,
        }
    }

    fn bound_store(&self) -> StagingResult<&Arc<dyn ObjectStore>> {
        self.object_store
            .as_ref()
            .ok_or_else(|| StagingError::NoObjectStore(self.stage_point.to_string()))
    }

    /// Materialize `source` as a new staged artifact under this store's stage point.
    pub fn load(&self, source: impl Into<Source>) -> StagingResult<StagedArtifact> {
        let source = source.into();
        let origin = source.describe();
        let suffix = source.suffix();

        let remote_target = match &self.stage_point {
            StagePoint::Remote(location) => Some((Arc::clone(self.bound_store()?), location.clone())),
            _ => None,
        };

        let bytes = match source {
            Source::Path(path) => std::fs::read(&path)
                .map_err(|e| StagingError::from_read(path.display().to_string(), e))?,
            Source::Data(bytes) => bytes,
            Source::Remote(key) => self.bound_store()?.get(&key)?,
        };

        let file = self.materialize(&bytes, &suffix)?;

        let remote = match remote_target {
            Some((store, location)) => {
                let key = location.key_for(&format!("{}{}", uuid::Uuid::new_v4(), suffix));
                store.put(&key, &bytes)?;
                debug!("uploaded {} bytes to {}/{}", bytes.len(), location, key);
                Some(RemoteCopy { store, key })
            }
            None => None,
        };

        Ok(StagedArtifact::new(file, origin, remote))
    }

    fn materialize(&self, bytes: &[u8], suffix: &str) -> StagingResult<tempfile::TempPath> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("tw-").suffix(suffix);
        let created = match self.scratch_dir() {
            Some(dir) => {
                std::fs::create_dir_all(dir)
                    .map_err(|e| StagingError::unwritable(dir.display().to_string(), e))?;
                builder.tempfile_in(dir)
            }
            None => builder.tempfile(),
        };
        let mut file =
            created.map_err(|e| StagingError::unwritable(self.stage_point.to_string(), e))?;
        file.write_all(bytes)
            .and_then(|_| file.flush())
            .map_err(|e| StagingError::unwritable(file.path().display().to_string(), e))?;
        Ok(file.into_temp_path())
    }

    /// Copy or upload the artifact's current content to `destination`.
    /// The artifact is borrowed and stays staged.
    pub fn save(
        &self,
        artifact: &StagedArtifact,
        destination: impl Into<Destination>,
    ) -> StagingResult<Destination> {
        let destination = destination.into();
        match &destination {
            Destination::Path(path) => {
                artifact.save_to(path)?;
            }
            Destination::Remote(key) => {
                let bytes = artifact.read_bytes()?;
                self.bound_store()?.put(key, &bytes)?;
            }
        }
        debug!("saved {} to {}", artifact.path().display(), destination);
        Ok(destination)
    }

    pub fn read_text(&self, artifact: &StagedArtifact) -> StagingResult<String> {
        artifact.read_text()
    }
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("stage_point", &self.stage_point)
            .field("object_store", &self.object_store.is_some())
            .finish()
    }
}
