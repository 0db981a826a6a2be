//! Taskweave Staging: private, lifetime-scoped local copies of kernel data
//!
//! A [`FileStore`] materializes content from a local path, raw bytes, or an
//! object-store key into a [`StagedArtifact`], and persists artifacts back to
//! a path or key. Where artifacts live is decided by the store's
//! [`StagePoint`].

pub mod artifact;
pub mod error;
pub mod object_store;
pub mod stage_point;
pub mod store;

pub use artifact::StagedArtifact;
pub use error::{StagingError, StagingResult};
pub use object_store::{FsObjectStore, MemoryObjectStore, ObjectStore};
pub use stage_point::{
    default_object_store, default_stage_point, set_default_object_store, set_default_stage_point,
    RemoteLocation, StagePoint,
};
pub use store::{Destination, FileStore, Source};
