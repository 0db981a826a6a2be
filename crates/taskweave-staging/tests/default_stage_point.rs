//! The process-wide default stage point lives in its own test binary so no
//! other test observes the mutation.

use std::sync::Arc;
use taskweave_staging::*;

#[test]
fn stores_capture_default_at_construction() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("default-stage");

    assert_eq!(default_stage_point(), StagePoint::Temp);
    let before = FileStore::new();

    let previous = set_default_stage_point(StagePoint::Local(dir.clone()));
    assert_eq!(previous, StagePoint::Temp);
    let after = FileStore::new();

    assert_eq!(before.stage_point(), &StagePoint::Temp);
    assert_eq!(after.stage_point(), &StagePoint::Local(dir.clone()));

    let artifact = after.load(Source::text("under default")).unwrap();
    assert!(artifact.path().starts_with(&dir));

    // A remote default needs the default object store alongside it.
    let bucket = Arc::new(MemoryObjectStore::new());
    set_default_stage_point(StagePoint::Remote(RemoteLocation::new("mem", "lab", "runs")));
    let unbound = FileStore::new();
    assert!(matches!(
        unbound.load(Source::text("x")),
        Err(StagingError::NoObjectStore(_))
    ));

    assert!(set_default_object_store(Some(bucket.clone())).is_none());
    let bound = FileStore::new();
    let remote = bound.load(Source::text("remote default")).unwrap();
    let key = remote.remote_key().unwrap().to_string();
    assert!(key.starts_with("runs/"));
    assert!(bucket.exists(&key));

    set_default_object_store(None);
    set_default_stage_point(StagePoint::Temp);
    assert_eq!(default_stage_point(), StagePoint::Temp);
    assert!(default_object_store().is_none());
}
