//! Staged artifacts: the handle to one privately materialized piece of content.

use crate::error::{StagingError, StagingResult};
use crate::object_store::ObjectStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempPath;
use tracing::{debug, warn};

/// Handle to content staged at a private local path.
///
/// Clones share the one staged copy. The backing storage is deleted exactly
/// once: when [`release`](Self::release) consumes the last handle, or when the
/// last handle is dropped.
#[derive(Clone)]
pub struct StagedArtifact {
    inner: Arc<Staged>,
}

pub(crate) struct RemoteCopy {
    pub(crate) store: Arc<dyn ObjectStore>,
    pub(crate) key: String,
}

struct Staged {
    local: PathBuf,
    origin: String,
    file: Option<TempPath>,
    remote: Option<RemoteCopy>,
}

impl Staged {
    /// Delete the backing storage. Idempotent: both parts are taken on first call.
    fn discard(&mut self) -> StagingResult<()> {
        let mut outcome = Ok(());
        if let Some(remote) = self.remote.take() {
            if let Err(e) = remote.store.delete(&remote.key) {
                outcome = Err(e);
            }
        }
        if let Some(file) = self.file.take() {
            if let Err(e) = file.close() {
                if outcome.is_ok() {
                    outcome = Err(StagingError::unwritable(self.local.display().to_string(), e));
                }
            }
        }
        outcome
    }
}

impl Drop for Staged {
    fn drop(&mut self) {
        if let Err(e) = self.discard() {
            warn!("failed to remove staged artifact {}: {}", self.local.display(), e);
        }
    }
}

impl StagedArtifact {
    pub(crate) fn new(file: TempPath, origin: String, remote: Option<RemoteCopy>) -> Self {
        let local = file.to_path_buf();
        debug!("staged {} from {}", local.display(), origin);
        Self {
            inner: Arc::new(Staged {
                local,
                origin,
                file: Some(file),
                remote,
            }),
        }
    }

    /// Current local path of the staged content.
    pub fn path(&self) -> &Path {
        &self.inner.local
    }

    /// Description of where the content was loaded from.
    pub fn origin(&self) -> &str {
        &self.inner.origin
    }

    /// Object key of the remote staged copy, when staged to a remote stage point.
    pub fn remote_key(&self) -> Option<&str> {
        self.inner.remote.as_ref().map(|r| r.key.as_str())
    }

    /// Number of live handles sharing this staged copy.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub fn read_bytes(&self) -> StagingResult<Vec<u8>> {
        std::fs::read(self.path())
            .map_err(|e| StagingError::from_read(self.path().display().to_string(), e))
    }

    pub fn read_text(&self) -> StagingResult<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes)
            .map_err(|e| StagingError::unreadable(self.path().display().to_string(), e))
    }

    /// Copy the staged content to a local path. The artifact stays staged.
    pub fn save_to(&self, destination: impl AsRef<Path>) -> StagingResult<PathBuf> {
        let destination = destination.as_ref();
        let label = destination.display().to_string();
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StagingError::unwritable(&label, e))?;
        }
        std::fs::copy(self.path(), destination).map_err(|e| StagingError::unwritable(&label, e))?;
        Ok(destination.to_path_buf())
    }

    /// Give up this handle. If it is the last one, the backing storage is
    /// deleted now and any deletion failure is returned; otherwise the
    /// remaining handles keep the content alive.
    pub fn release(self) -> StagingResult<()> {
        match Arc::try_unwrap(self.inner) {
            Ok(mut staged) => {
                debug!("releasing {}", staged.local.display());
                staged.discard()
            }
            Err(_shared) => Ok(()),
        }
    }
}

impl AsRef<Path> for StagedArtifact {
    fn as_ref(&self) -> &Path {
        self.path()
    }
}

impl std::fmt::Display for StagedArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path().display())
    }
}

impl std::fmt::Debug for StagedArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedArtifact")
            .field("path", &self.inner.local)
            .field("origin", &self.inner.origin)
            .field("remote_key", &self.remote_key())
            .finish()
    }
}
