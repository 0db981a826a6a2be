//! Stage points: where staged artifacts are materialized
//!
//! One process-wide default exists, reachable only through
//! [`default_stage_point`] and [`set_default_stage_point`], alongside the
//! object store a remote default resolves to ([`set_default_object_store`]).
//! A [`FileStore`] copies both when it is constructed and never consults
//! them again.
//!
//! [`FileStore`]: crate::FileStore

use crate::error::StagingError;
use crate::object_store::ObjectStore;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

static DEFAULT_STAGE_POINT: RwLock<StagePoint> = RwLock::new(StagePoint::Temp);
static DEFAULT_OBJECT_STORE: RwLock<Option<Arc<dyn ObjectStore>>> = RwLock::new(None);

/// Where a store materializes its artifacts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum StagePoint {
    /// A private location under the system temp directory.
    #[default]
    Temp,
    /// Artifacts are staged under this directory.
    Local(PathBuf),
    /// Artifacts are uploaded to an object store at this location.
    Remote(RemoteLocation),
}

/// `scheme://bucket/prefix`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RemoteLocation {
    pub scheme: String,
    pub bucket: String,
    pub prefix: String,
}

impl RemoteLocation {
    pub fn new(scheme: impl Into<String>, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            bucket: bucket.into(),
            prefix: prefix.into().trim_matches('/').to_string(),
        }
    }

    /// Object key for `name` under this location's prefix.
    pub fn key_for(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.prefix, name)
        }
    }
}

impl std::fmt::Display for RemoteLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.prefix.is_empty() {
            write!(f, "{}://{}", self.scheme, self.bucket)
        } else {
            write!(f, "{}://{}/{}", self.scheme, self.bucket, self.prefix)
        }
    }
}

impl std::fmt::Display for StagePoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Temp => write!(f, "(system temp)"),
            Self::Local(dir) => write!(f, "{}", dir.display()),
            Self::Remote(location) => write!(f, "{}", location),
        }
    }
}

impl FromStr for StagePoint {
    type Err = StagingError;

    /// Empty → temp, `file:///dir` or a bare path → local, `scheme://bucket/prefix` → remote.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::Temp);
        }
        let Some((scheme, rest)) = s.split_once("://") else {
            return Ok(Self::Local(PathBuf::from(s)));
        };
        let valid_scheme = !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !valid_scheme {
            return Err(StagingError::InvalidStagePoint(s.to_string()));
        }
        if scheme == "file" {
            if rest.is_empty() {
                return Err(StagingError::InvalidStagePoint(s.to_string()));
            }
            return Ok(Self::Local(PathBuf::from(rest)));
        }
        let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(StagingError::InvalidStagePoint(s.to_string()));
        }
        Ok(Self::Remote(RemoteLocation::new(scheme, bucket, prefix)))
    }
}

/// The process-wide default stage point.
pub fn default_stage_point() -> StagePoint {
    match DEFAULT_STAGE_POINT.read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Replace the process-wide default stage point, returning the previous one.
///
/// Stores constructed before the call keep the stage point they captured.
pub fn set_default_stage_point(stage_point: StagePoint) -> StagePoint {
    tracing::debug!("default stage point set to {}", stage_point);
    let mut guard = match DEFAULT_STAGE_POINT.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    std::mem::replace(&mut *guard, stage_point)
}

/// The object store bound to stores built from the process-wide default.
pub fn default_object_store() -> Option<Arc<dyn ObjectStore>> {
    match DEFAULT_OBJECT_STORE.read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Replace the process-wide default object store, returning the previous one.
pub fn set_default_object_store(
    store: Option<Arc<dyn ObjectStore>>,
) -> Option<Arc<dyn ObjectStore>> {
    tracing::debug!("default object store set to {:?}", store);
    let mut guard = match DEFAULT_OBJECT_STORE.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    std::mem::replace(&mut *guard, store)
}
