//! taskweave: run shell commands as staged kernels
//!
//! Usage:
//!   taskweave run "sort in.txt > out.txt" -i in.txt=data.txt -o out.txt
//!   taskweave map "wc -l < in.txt" -i in.txt -o STDOUT a.txt b.txt
//!   taskweave init-config > taskweave.toml

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use taskweave::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "taskweave",
    about = "Run shell commands as kernels with staged inputs and outputs",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (TOML)
    #[arg(long, global = true, default_value = "taskweave.toml")]
    config: PathBuf,

    /// Write logs to a file (in addition to stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a command once
    Run {
        /// Shell command template, run inside a private working directory
        command: String,
        /// Input as NAME=PATH; repeat a glob NAME to pass several files
        #[arg(short, long = "input", value_parser = parse_input)]
        inputs: Vec<(String, PathBuf)>,
        /// Output name: a filename, a glob pattern, STDOUT or DEBUGINFO
        #[arg(short, long = "output", required = true)]
        outputs: Vec<String>,
        /// Directory file outputs are saved into
        #[arg(short, long, default_value = ".")]
        dest: PathBuf,
    },
    /// Run a command once per file
    Map {
        /// Shell command template, run inside a private working directory
        command: String,
        /// Name each file is staged under
        #[arg(short, long)]
        input: String,
        /// Output name: a filename, a glob pattern, STDOUT or DEBUGINFO
        #[arg(short, long = "output", required = true)]
        outputs: Vec<String>,
        /// Directory file outputs are saved into, one numbered subdirectory per file
        #[arg(short, long, default_value = ".")]
        dest: PathBuf,
        /// Files to run over
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print a default config file
    InitConfig,
}

fn parse_input(raw: &str) -> std::result::Result<(String, PathBuf), String> {
    match raw.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => {
            Ok((name.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected NAME=PATH, got '{}'", raw)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_deref())?;

    match cli.command {
        Commands::InitConfig => {
            print!("{}", TaskweaveConfig::default().to_toml());
        }
        Commands::Run {
            command,
            inputs,
            outputs,
            dest,
        } => {
            let config = load_config(&cli.config)?;
            run_once(&config, command, inputs, outputs, &dest).await?;
        }
        Commands::Map {
            command,
            input,
            outputs,
            dest,
            files,
        } => {
            let config = load_config(&cli.config)?;
            run_map(&config, command, input, outputs, files, &dest).await?;
        }
    }

    Ok(())
}

fn init_tracing(
    log_file: Option<&Path>,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .with_context(|| format!("--log-file {} has no file name", path.display()))?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskweave=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(guard)
}

fn load_config(path: &Path) -> anyhow::Result<TaskweaveConfig> {
    let config = TaskweaveConfig::load(path);
    let stage_point = config.apply()?;
    tracing::debug!("stage point: {}", stage_point);
    Ok(config)
}

/// Group `NAME=PATH` pairs by name in first-seen order. Glob names collect
/// every path given for them into one list.
fn group_inputs(inputs: Vec<(String, PathBuf)>) -> anyhow::Result<(Vec<String>, Vec<Arg>)> {
    let mut names: Vec<String> = Vec::new();
    let mut paths: Vec<Vec<PathBuf>> = Vec::new();
    for (name, path) in inputs {
        match names.iter().position(|n| *n == name) {
            Some(i) => paths[i].push(path),
            None => {
                names.push(name);
                paths.push(vec![path]);
            }
        }
    }

    let mut args = Vec::with_capacity(names.len());
    for (name, mut group) in names.iter().zip(paths) {
        if taskweave::kernels::is_glob(name) {
            args.push(Arg::Value(Value::List(group.into_iter().map(Value::Path).collect())));
        } else if group.len() == 1 {
            args.push(Arg::from(group.remove(0)));
        } else {
            anyhow::bail!(
                "input {} given {} times; only glob inputs take several files",
                name,
                group.len()
            );
        }
    }
    Ok((names, args))
}

async fn run_once(
    config: &TaskweaveConfig,
    command: String,
    inputs: Vec<(String, PathBuf)>,
    outputs: Vec<String>,
    dest: &Path,
) -> anyhow::Result<()> {
    let (names, args) = group_inputs(inputs)?;
    let store = config.staging.file_store()?;
    let kernel = SubprocessKernel::configured(command, &config.kernels)
        .with_inputs(names)
        .with_outputs(outputs.clone())
        .with_store(store.clone());

    let client = ExecutionClient::from_config(config)?;
    let submission = client.submit(kernel, args)?;
    let result = client.gather(&submission).await;
    client.close().await;

    let delivered = deliver_outputs(&store, &outputs, result?.into_vec(), dest)?;
    report(&delivered, None)
}

async fn run_map(
    config: &TaskweaveConfig,
    command: String,
    input: String,
    outputs: Vec<String>,
    files: Vec<PathBuf>,
    dest: &Path,
) -> anyhow::Result<()> {
    let store = config.staging.file_store()?;
    let kernel = SubprocessKernel::configured(command, &config.kernels)
        .with_inputs([input])
        .with_outputs(outputs.clone())
        .with_store(store.clone());

    let client = ExecutionClient::from_config(config)?;
    let batch = client.map(kernel, vec![MapArg::each(files.iter().cloned())])?;

    let rows = collect_rows(&client, &batch, files.len()).await;
    client.close().await;

    let width = taskweave::kernels::index_width(files.len());
    for (index, (file, row)) in files.iter().zip(rows?).enumerate() {
        let subdir = dest.join(format!("{:0width$}", index, width = width));
        let delivered = deliver_outputs(&store, &outputs, row, &subdir)?;
        report(&delivered, Some(file))?;
    }
    Ok(())
}

/// One row of values per mapped file, whichever shape the batch came back in.
async fn collect_rows(
    client: &ExecutionClient,
    batch: &BatchSubmission,
    count: usize,
) -> anyhow::Result<Vec<Vec<Value>>> {
    Ok(match batch {
        BatchSubmission::Single(futures) => client
            .gather_all(futures)
            .await?
            .into_iter()
            .map(|v| vec![v])
            .collect(),
        BatchSubmission::Multiple(per_output) => {
            let mut rows = vec![Vec::with_capacity(per_output.len()); count];
            for futures in per_output {
                for (row, value) in rows.iter_mut().zip(client.gather_all(futures).await?) {
                    row.push(value);
                }
            }
            rows
        }
    })
}

fn report(delivered: &[Delivered], file: Option<&Path>) -> anyhow::Result<()> {
    if let Some(file) = file {
        println!("== {}", file.display());
    }
    for item in delivered {
        match item {
            Delivered::Saved { output, path } => println!("{}: saved {}", output, path.display()),
            Delivered::Text { text, .. } => print!("{}", text),
            Delivered::Diagnostic { info, .. } => {
                println!("{}", serde_json::to_string_pretty(info)?);
            }
            Delivered::Other { output, value } => println!("{}: {}", output, value),
            Delivered::Empty { output } => println!("{}: (not produced)", output),
        }
    }
    Ok(())
}
