//! Object store contract: the load/save surface of a remote bucket.
//!
//! Real deployments bind an SDK-backed implementation; the two bundled
//! stores cover tests and single-machine setups.

use crate::error::{StagingError, StagingResult};
use dashmap::DashMap;
use std::path::{Component, Path, PathBuf};

/// A flat key → bytes bucket.
///
/// Calls are blocking: an artifact's remote copy is deleted from `Drop`.
pub trait ObjectStore: Send + Sync + std::fmt::Debug {
    fn get(&self, key: &str) -> StagingResult<Vec<u8>>;
    fn put(&self, key: &str, data: &[u8]) -> StagingResult<()>;
    fn delete(&self, key: &str) -> StagingResult<()>;
    fn exists(&self, key: &str) -> bool;
}

/// In-memory bucket.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: DashMap<String, Vec<u8>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }
}

impl ObjectStore for MemoryObjectStore {
    fn get(&self, key: &str) -> StagingResult<Vec<u8>> {
        self.objects
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StagingError::NotFound(key.to_string()))
    }

    fn put(&self, key: &str, data: &[u8]) -> StagingResult<()> {
        self.objects.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> StagingResult<()> {
        self.objects.remove(key);
        Ok(())
    }

    fn exists(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }
}

/// A directory standing in for a bucket: key `a/b.txt` lives at `root/a/b.txt`.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> StagingResult<PathBuf> {
        let rel = Path::new(key);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(StagingError::Remote(format!("invalid object key: {key:?}")));
        }
        Ok(self.root.join(rel))
    }
}

impl ObjectStore for FsObjectStore {
    fn get(&self, key: &str) -> StagingResult<Vec<u8>> {
        let path = self.object_path(key)?;
        std::fs::read(&path).map_err(|e| StagingError::from_read(key, e))
    }

    fn put(&self, key: &str, data: &[u8]) -> StagingResult<()> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StagingError::unwritable(key, e))?;
        }
        std::fs::write(&path, data).map_err(|e| StagingError::unwritable(key, e))?;
        tracing::debug!("put {} ({} bytes)", path.display(), data.len());
        Ok(())
    }

    fn delete(&self, key: &str) -> StagingResult<()> {
        let path = self.object_path(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StagingError::Remote(format!("delete {key}: {e}"))),
        }
    }

    fn exists(&self, key: &str) -> bool {
        self.object_path(key).map(|p| p.is_file()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_put_get_delete() {
        let store = MemoryObjectStore::new();
        store.put("runs/a.txt", b"alpha").unwrap();
        assert!(store.exists("runs/a.txt"));
        assert_eq!(store.get("runs/a.txt").unwrap(), b"alpha");
        store.delete("runs/a.txt").unwrap();
        assert!(!store.exists("runs/a.txt"));
        assert!(matches!(store.get("runs/a.txt"), Err(StagingError::NotFound(_))));
    }

    #[test]
    fn fs_store_nests_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(tmp.path());
        store.put("prefix/deep/b.dat", b"beta").unwrap();
        assert!(tmp.path().join("prefix/deep/b.dat").is_file());
        assert_eq!(store.get("prefix/deep/b.dat").unwrap(), b"beta");
        store.delete("prefix/deep/b.dat").unwrap();
        store.delete("prefix/deep/b.dat").unwrap();
        assert!(!store.exists("prefix/deep/b.dat"));
    }

    #[test]
    fn fs_store_rejects_escaping_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(tmp.path());
        assert!(store.put("../outside.txt", b"x").is_err());
        assert!(store.put("/abs.txt", b"x").is_err());
        assert!(!store.exists("../outside.txt"));
    }
}
