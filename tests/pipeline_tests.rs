//! End-to-end: stage inputs, run kernels through the client, deliver outputs

use std::path::Path;
use std::sync::Arc;
use taskweave::prelude::*;

fn store_in(dir: &Path) -> FileStore {
    FileStore::with_stage_point(StagePoint::Local(dir.join("stage")))
}

#[tokio::test]
async fn split_then_count_pipeline() {
    let tmp = tempfile::tempdir().unwrap();
    let store = store_in(tmp.path());
    let src = tmp.path().join("lines.txt");
    std::fs::write(&src, "one two\nthree\nfour five six\n").unwrap();
    let input = store.load(src).unwrap();

    let split = SubprocessKernel::new("split -l 1 input.txt")
        .with_inputs(["input.txt"])
        .with_outputs(["x*"])
        .with_store(store.clone());
    let words = FunctionKernel::new("words", |args| {
        let path = args[0]
            .as_path()
            .ok_or_else(|| anyhow::anyhow!("expected a file"))?;
        Ok(Value::Int(std::fs::read_to_string(path)?.split_whitespace().count() as i64))
    })
    .with_inputs(["part"])
    .with_outputs(["count"]);

    let client = ExecutionClient::new(Arc::new(LocalBackend::new(2).unwrap()));
    let parts = client.submit(split, vec![input.into()]).unwrap();
    let parts = client
        .resolve(parts.single().unwrap())
        .await
        .unwrap()
        .as_list()
        .unwrap()
        .to_vec();
    assert_eq!(parts.len(), 3);

    let batch = client
        .map(words, vec![MapArg::each(parts.into_iter().map(Arg::Value))])
        .unwrap();
    let counts = client.gather_all(batch.single().unwrap()).await.unwrap();
    let counts: Vec<i64> = counts.iter().map(|v| v.as_int().unwrap()).collect();
    assert_eq!(counts, vec![2, 1, 3]);

    client.close().await;
}

#[tokio::test]
async fn deliver_saves_files_and_returns_text() {
    let tmp = tempfile::tempdir().unwrap();
    let store = store_in(tmp.path());
    let kernel = SubprocessKernel::new("printf 'a\\nb\\n' > out.txt; split -l 1 out.txt part_; echo ok")
        .with_outputs(["out.txt", "part_*", STDOUT, DEBUGINFO])
        .with_store(store.clone());

    let outcome = kernel.run(vec![]).await.unwrap();
    let dest = tmp.path().join("results");
    let delivered = deliver_outputs(&store, kernel.outputs(), outcome.into_vec(), &dest).unwrap();

    assert_eq!(std::fs::read_to_string(dest.join("out.txt")).unwrap(), "a\nb\n");
    assert_eq!(std::fs::read_to_string(dest.join("part_0")).unwrap(), "a\n");
    assert_eq!(std::fs::read_to_string(dest.join("part_1")).unwrap(), "b\n");
    assert!(delivered
        .iter()
        .any(|d| matches!(d, Delivered::Text { text, .. } if text == "ok\n")));
    assert!(delivered
        .iter()
        .any(|d| matches!(d, Delivered::Diagnostic { info, .. } if info.succeeded())));
}

#[tokio::test]
async fn config_selects_worker_count() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("taskweave.toml");
    std::fs::write(&path, "[backend]\nworkers = 3\n").unwrap();

    let config = TaskweaveConfig::load(&path);
    assert_eq!(config.backend.workers, 3);
    let backend = LocalBackend::from_config(&config.backend).unwrap();
    assert_eq!(backend.workers(), 3);
}
