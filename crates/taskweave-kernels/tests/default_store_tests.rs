//! Staging defaults installed from config are process-wide, so these tests
//! live in their own binary and run as one test.

use taskweave_core::TaskweaveConfig;
use taskweave_kernels::*;
use taskweave_staging::{FsObjectStore, ObjectStore, StagePoint};

#[tokio::test]
async fn applied_config_drives_default_kernel_staging() {
    let tmp = tempfile::tempdir().unwrap();
    let bucket = tmp.path().join("bucket");

    let mut config = TaskweaveConfig::default();
    config.staging.stage_point = Some("mem://lab/runs".into());
    config.staging.object_store_root = Some(bucket.clone());
    let stage_point = config.apply().unwrap();
    assert!(matches!(stage_point, StagePoint::Remote(_)));

    // No explicit store: the kernel picks up both applied defaults.
    let kernel = SubprocessKernel::new("echo hi > out.txt").with_outputs(["out.txt"]);
    let value = kernel.run(vec![]).await.unwrap().single().unwrap();
    let artifact = value.as_artifact().expect("artifact output");
    let key = artifact.remote_key().expect("staged remotely").to_string();
    assert!(key.starts_with("runs/"), "{key}");
    assert!(FsObjectStore::new(&bucket).exists(&key));
    assert_eq!(artifact.read_text().unwrap(), "hi\n");

    // Back to defaults: staging is local again.
    TaskweaveConfig::default().apply().unwrap();
    let kernel = SubprocessKernel::new("echo hi > out.txt").with_outputs(["out.txt"]);
    let value = kernel.run(vec![]).await.unwrap().single().unwrap();
    assert!(value.as_artifact().unwrap().remote_key().is_none());
}
