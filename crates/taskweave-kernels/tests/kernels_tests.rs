//! Tests for taskweave-kernels: function and subprocess kernels

use std::path::{Path, PathBuf};
use taskweave_core::{Error, ExecutionError, KernelConfig, Outcome, Value};
use taskweave_kernels::*;
use taskweave_staging::{FileStore, StagePoint, StagedArtifact};

fn store_in(dir: &Path) -> FileStore {
    FileStore::with_stage_point(StagePoint::Local(dir.join("stage")))
}

fn stage_text(store: &FileStore, dir: &Path, name: &str, content: &str) -> StagedArtifact {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    store.load(path).unwrap()
}

fn single(outcome: Outcome) -> Value {
    outcome.single().expect("single output")
}

// ===========================================================================
// Function kernels
// ===========================================================================

fn mult() -> FunctionKernel {
    FunctionKernel::new("mult", |args| {
        let a = args[0].as_int().unwrap_or_default();
        let b = args[1].as_int().unwrap_or_default();
        Ok(Value::Int(a * b))
    })
    .with_inputs(["a", "b"])
    .with_outputs(["ab"])
}

fn linecount() -> FunctionKernel {
    FunctionKernel::new("linecount", |args| {
        let path = args[0]
            .as_path()
            .ok_or_else(|| anyhow::anyhow!("expected a path, got {}", args[0].kind()))?;
        let text = std::fs::read_to_string(path)?;
        Ok(Value::Int(text.lines().count() as i64))
    })
    .with_inputs(["lines.txt"])
    .with_outputs(["count"])
}

#[tokio::test]
async fn function_kernel_multiplies() {
    let out = mult().run(vec![3.into(), 4.into()]).await.unwrap();
    assert_eq!(single(out).as_int(), Some(12));
}

#[tokio::test]
async fn function_kernel_sees_artifact_as_path() {
    let tmp = tempfile::tempdir().unwrap();
    let store = store_in(tmp.path());
    let artifact = stage_text(&store, tmp.path(), "in.txt", "a\nb\nc\n");

    let out = linecount().run(vec![artifact.clone().into()]).await.unwrap();
    assert_eq!(single(out).as_int(), Some(3));
    assert!(artifact.path().exists());
}

#[tokio::test]
async fn function_kernel_accepts_plain_path() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("in.txt");
    std::fs::write(&path, "one\ntwo\n").unwrap();

    let out = linecount().run(vec![path.into()]).await.unwrap();
    assert_eq!(single(out).as_int(), Some(2));
}

#[tokio::test]
async fn function_kernel_arity_mismatch() {
    let err = mult().run(vec![3.into()]).await.unwrap_err();
    match err {
        Error::Arity { context, detail } => {
            assert_eq!(context, "mult");
            assert_eq!(detail, "expected 2 arguments, got 1");
        }
        other => panic!("expected arity error, got {other:?}"),
    }
}

#[tokio::test]
async fn function_kernel_multiple_outputs() {
    let divmod = FunctionKernel::new("divmod", |args| {
        let a = args[0].as_int().unwrap_or_default();
        let b = args[1].as_int().unwrap_or(1);
        Ok(Value::Tuple(vec![(a / b).into(), (a % b).into()]))
    })
    .with_inputs(["a", "b"])
    .with_outputs(["q", "r"]);

    assert!(divmod.is_multi_output());
    match divmod.run(vec![17.into(), 5.into()]).await.unwrap() {
        Outcome::Multiple(items) => {
            assert_eq!(items[0].as_int(), Some(3));
            assert_eq!(items[1].as_int(), Some(2));
        }
        other => panic!("expected multiple, got {other:?}"),
    }
}

#[tokio::test]
async fn function_kernel_wrong_tuple_length() {
    let bad = FunctionKernel::new("bad", |_| Ok(Value::Tuple(vec![1.into()])))
        .with_outputs(["x", "y"]);
    let err = bad.run(vec![]).await.unwrap_err();
    assert!(matches!(err, Error::Arity { .. }));
}

#[tokio::test]
async fn function_kernel_failure_is_execution_error() {
    let failing = FunctionKernel::new("failing", |_| {
        Err(anyhow::anyhow!("inner").context("outer"))
    });
    let err = failing.run(vec![]).await.unwrap_err();
    match err {
        Error::Execution(ExecutionError::Function { kernel, message }) => {
            assert_eq!(kernel, "failing");
            assert_eq!(message, "outer: inner");
        }
        other => panic!("expected execution error, got {other:?}"),
    }
}

#[tokio::test]
async fn function_kernel_panic_is_execution_error() {
    let boom = FunctionKernel::new("boom", |_| panic!("exploded on purpose"));
    let err = boom.run(vec![]).await.unwrap_err();
    match err {
        Error::Execution(ExecutionError::Function { kernel, message }) => {
            assert_eq!(kernel, "boom");
            assert!(message.contains("exploded on purpose"), "{message}");
        }
        other => panic!("expected execution error, got {other:?}"),
    }

    // The kernel stays usable after a panicking run.
    let err = boom.run(vec![]).await.unwrap_err();
    assert!(matches!(err, Error::Execution(_)));
}

// ===========================================================================
// Subprocess kernels: inputs and outputs
// ===========================================================================

#[tokio::test]
async fn cat_to_stdout() {
    let tmp = tempfile::tempdir().unwrap();
    let store = store_in(tmp.path());
    let artifact = stage_text(&store, tmp.path(), "src.txt", "content");

    let kernel = SubprocessKernel::new("cat file.txt")
        .with_inputs(["file.txt"])
        .with_outputs([STDOUT])
        .with_store(store);
    assert_eq!(kernel.name(), "cat");

    let out = kernel.run(vec![artifact.into()]).await.unwrap();
    assert_eq!(single(out).as_text(), Some("content"));
}

#[tokio::test]
async fn cat_plain_path_and_text_inputs() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("src.txt");
    std::fs::write(&path, "from path").unwrap();

    let kernel = SubprocessKernel::new("cat a.txt b.txt")
        .with_inputs(["a.txt", "b.txt"])
        .with_outputs([STDOUT])
        .with_store(store_in(tmp.path()));

    let out = kernel
        .run(vec![path.into(), Value::from(" and text")])
        .await
        .unwrap();
    assert_eq!(single(out).as_text(), Some("from path and text"));
}

#[tokio::test]
async fn literal_output_is_staged_artifact() {
    let tmp = tempfile::tempdir().unwrap();
    let store = store_in(tmp.path());
    let artifact = stage_text(&store, tmp.path(), "src.txt", "content");

    let kernel = SubprocessKernel::new("cat file.txt > out.dat")
        .with_inputs(["file.txt"])
        .with_outputs(["out.dat"])
        .with_store(store);

    let out = single(kernel.run(vec![artifact.into()]).await.unwrap());
    let staged = out.as_artifact().expect("artifact output");
    assert_eq!(staged.read_text().unwrap(), "content");
    assert!(staged.path().starts_with(tmp.path().join("stage")));
    assert_eq!(staged.path().extension().unwrap(), "dat");
}

#[tokio::test]
async fn glob_input_preserves_list_order() {
    let tmp = tempfile::tempdir().unwrap();
    let store = store_in(tmp.path());
    let first = stage_text(&store, tmp.path(), "1.txt", "content\n");
    let second = stage_text(&store, tmp.path(), "2.txt", "more content\n");

    let kernel = SubprocessKernel::new("cat *.txt > out.dat")
        .with_inputs(["*.txt"])
        .with_outputs(["out.dat"])
        .with_store(store);

    let out = single(
        kernel
            .run(vec![Value::from(vec![first, second])])
            .await
            .unwrap(),
    );
    assert_eq!(
        out.as_artifact().unwrap().read_text().unwrap(),
        "content\nmore content\n"
    );
}

#[tokio::test]
async fn glob_input_orders_past_ten_elements() {
    let tmp = tempfile::tempdir().unwrap();
    let items: Vec<Value> = (0..12).map(|i| Value::from(format!("{i}\n"))).collect();

    let kernel = SubprocessKernel::new("cat part_*")
        .with_inputs(["part_*"])
        .with_outputs([STDOUT])
        .with_store(store_in(tmp.path()));

    let out = single(kernel.run(vec![Value::List(items)]).await.unwrap());
    let expected: String = (0..12).map(|i| format!("{i}\n")).collect();
    assert_eq!(out.as_text(), Some(expected.as_str()));
}

#[tokio::test]
async fn glob_input_requires_list() {
    let tmp = tempfile::tempdir().unwrap();
    let kernel = SubprocessKernel::new("cat *.txt")
        .with_inputs(["*.txt"])
        .with_outputs([STDOUT])
        .with_store(store_in(tmp.path()));

    let err = kernel.run(vec!["not a list".into()]).await.unwrap_err();
    assert!(matches!(err, Error::Arity { .. }));
}

#[tokio::test]
async fn glob_input_without_star_rejected_before_staging() {
    let tmp = tempfile::tempdir().unwrap();
    let kernel = SubprocessKernel::new("cat file?.txt")
        .with_inputs(["file?.txt"])
        .with_outputs([STDOUT])
        .with_store(store_in(tmp.path()));

    assert!(matches!(kernel.check_arity(1), Err(Error::Arity { .. })));
    let err = kernel
        .run(vec![Value::List(vec!["a".into()])])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Arity { .. }));
    assert!(!tmp.path().join("stage").exists());
}

#[tokio::test]
async fn literal_input_rejects_list() {
    let tmp = tempfile::tempdir().unwrap();
    let kernel = SubprocessKernel::new("cat in.txt")
        .with_inputs(["in.txt"])
        .with_outputs([STDOUT])
        .with_store(store_in(tmp.path()));

    let err = kernel
        .run(vec![Value::List(vec!["a".into()])])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Arity { .. }));
}

#[tokio::test]
async fn glob_output_split_lines() {
    let tmp = tempfile::tempdir().unwrap();
    let store = store_in(tmp.path());
    let artifact = stage_text(&store, tmp.path(), "src.txt", "a\nb\nc\n");

    let kernel = SubprocessKernel::new("split -l 1 input.txt")
        .with_inputs(["input.txt"])
        .with_outputs(["x*"])
        .with_store(store);

    let out = single(kernel.run(vec![artifact.into()]).await.unwrap());
    let parts = out.as_list().expect("list output");
    assert_eq!(parts.len(), 3);
    let texts: Vec<String> = parts
        .iter()
        .map(|p| p.as_artifact().unwrap().read_text().unwrap())
        .collect();
    assert_eq!(texts, vec!["a\n", "b\n", "c\n"]);
}

#[tokio::test]
async fn glob_output_without_matches_is_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let kernel = SubprocessKernel::new("true")
        .with_outputs(["*.csv"])
        .with_store(store_in(tmp.path()));

    let out = single(kernel.run(vec![]).await.unwrap());
    assert_eq!(out.as_list().map(|l| l.len()), Some(0));
}

#[tokio::test]
async fn multiple_outputs_in_declaration_order() {
    let tmp = tempfile::tempdir().unwrap();
    let kernel = SubprocessKernel::new("echo one > a.txt; echo two > b.txt; echo done")
        .with_outputs(["b.txt", STDOUT, "a.txt"])
        .with_store(store_in(tmp.path()));

    let items = kernel.run(vec![]).await.unwrap().into_vec();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].as_artifact().unwrap().read_text().unwrap(), "two\n");
    assert_eq!(items[1].as_text(), Some("done\n"));
    assert_eq!(items[2].as_artifact().unwrap().read_text().unwrap(), "one\n");
}

#[tokio::test]
async fn missing_literal_output_is_staging_error() {
    let tmp = tempfile::tempdir().unwrap();
    let kernel = SubprocessKernel::new("true")
        .with_outputs(["never.txt"])
        .with_store(store_in(tmp.path()));

    let err = kernel.run(vec![]).await.unwrap_err();
    assert!(matches!(err, Error::Staging(_)));
}

#[tokio::test]
async fn subprocess_arity_mismatch() {
    let tmp = tempfile::tempdir().unwrap();
    let kernel = SubprocessKernel::new("cat a b")
        .with_inputs(["a", "b"])
        .with_outputs([STDOUT])
        .with_store(store_in(tmp.path()));

    let err = kernel.run(vec!["x".into()]).await.unwrap_err();
    assert!(matches!(err, Error::Arity { .. }));
}

// ===========================================================================
// Subprocess kernels: failure policy
// ===========================================================================

#[tokio::test]
async fn failing_command_raises_without_debuginfo() {
    let tmp = tempfile::tempdir().unwrap();
    let kernel = SubprocessKernel::new("foo -bar")
        .with_outputs([STDOUT])
        .with_store(store_in(tmp.path()));

    let err = kernel.run(vec![]).await.unwrap_err();
    assert!(matches!(err, Error::Execution(ExecutionError::Command { .. })));
    assert_eq!(err.exit_code(), Some(127));
}

#[tokio::test]
async fn failing_command_returns_debuginfo() {
    let tmp = tempfile::tempdir().unwrap();
    let kernel = SubprocessKernel::new("foo -bar")
        .with_outputs([DEBUGINFO])
        .with_store(store_in(tmp.path()));

    let out = single(kernel.run(vec![]).await.unwrap());
    let info = out.as_debug().expect("debuginfo output");
    assert_eq!(info.command, "foo -bar");
    assert!(!info.succeeded());
    assert_eq!(info.exit_code, Some(127));
    assert!(!info.stderr.is_empty());
}

#[tokio::test]
async fn exit_code_and_stderr_are_carried() {
    let tmp = tempfile::tempdir().unwrap();
    let kernel = SubprocessKernel::new("echo broken >&2; exit 3")
        .with_outputs([STDOUT])
        .with_store(store_in(tmp.path()));

    match kernel.run(vec![]).await.unwrap_err() {
        Error::Execution(ExecutionError::Command { exit_code, stderr, .. }) => {
            assert_eq!(exit_code, Some(3));
            assert_eq!(stderr, "broken\n");
        }
        other => panic!("expected command error, got {other:?}"),
    }
}

#[tokio::test]
async fn debuginfo_with_missing_file_output_after_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let kernel = SubprocessKernel::new("exit 1")
        .with_outputs(["out.dat", DEBUGINFO])
        .with_store(store_in(tmp.path()));

    let items = kernel.run(vec![]).await.unwrap().into_vec();
    assert!(items[0].is_none());
    assert_eq!(items[1].as_debug().unwrap().exit_code, Some(1));
}

#[tokio::test]
async fn debuginfo_on_success() {
    let tmp = tempfile::tempdir().unwrap();
    let kernel = SubprocessKernel::new("echo hi")
        .with_outputs([STDOUT, DEBUGINFO])
        .with_store(store_in(tmp.path()));

    let items = kernel.run(vec![]).await.unwrap().into_vec();
    assert_eq!(items[0].as_text(), Some("hi\n"));
    let info = items[1].as_debug().unwrap();
    assert!(info.succeeded());
    assert_eq!(info.stdout, "hi\n");
}

#[tokio::test]
async fn missing_shell_is_spawn_error() {
    let tmp = tempfile::tempdir().unwrap();
    let kernel = SubprocessKernel::new("echo hi")
        .shell("/nonexistent/shell")
        .with_outputs([DEBUGINFO])
        .with_store(store_in(tmp.path()));

    let err = kernel.run(vec![]).await.unwrap_err();
    assert!(matches!(err, Error::Execution(ExecutionError::Spawn { .. })));
}

// ===========================================================================
// Working directory lifetime
// ===========================================================================

async fn run_pwd(kernel: SubprocessKernel) -> PathBuf {
    let out = single(kernel.run(vec![]).await.unwrap());
    PathBuf::from(out.as_text().unwrap().trim())
}

#[tokio::test]
async fn workdir_removed_after_run() {
    let tmp = tempfile::tempdir().unwrap();
    let kernel = SubprocessKernel::new("pwd")
        .with_outputs([STDOUT])
        .with_store(store_in(tmp.path()));

    let workdir = run_pwd(kernel).await;
    assert!(workdir.starts_with(tmp.path().join("stage").canonicalize().unwrap()));
    assert!(!workdir.exists());
}

#[tokio::test]
async fn workdir_removed_after_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let stage = tmp.path().join("stage");
    let kernel = SubprocessKernel::new("exit 2")
        .with_outputs([STDOUT])
        .with_store(store_in(tmp.path()));

    kernel.run(vec![]).await.unwrap_err();
    let leftovers = std::fs::read_dir(&stage).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn retained_workdir_survives() {
    let tmp = tempfile::tempdir().unwrap();
    let config = KernelConfig {
        retain_workdirs: true,
        ..KernelConfig::default()
    };
    let kernel = SubprocessKernel::configured("pwd", &config)
        .with_outputs([STDOUT])
        .with_store(store_in(tmp.path()));

    let workdir = run_pwd(kernel).await;
    assert!(workdir.is_dir());
    std::fs::remove_dir_all(&workdir).unwrap();
}

#[tokio::test]
async fn kernel_is_reusable() {
    let tmp = tempfile::tempdir().unwrap();
    let kernel = SubprocessKernel::new("cat in.txt")
        .with_inputs(["in.txt"])
        .with_outputs([STDOUT])
        .with_store(store_in(tmp.path()));

    for word in ["alpha", "beta"] {
        let out = single(kernel.run(vec![word.into()]).await.unwrap());
        assert_eq!(out.as_text(), Some(word));
    }
}
