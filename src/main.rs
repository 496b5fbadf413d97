use anyhow::{Context, bail};
use argh::FromArgs;
use command_runner::repl::{Repl, assignments};
use command_runner::{
    ArgvBuilder, ConsoleSink, ExecutionState, Executor, ExecutorConfig, Runner, SchemaCommand,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(FromArgs)]
/// Browse and run the commands of a script's CLI.
/// Without a command, an interactive console is started.
struct Args {
    #[argh(option)]
    /// JSON description of the command tree.
    tree: PathBuf,

    #[argh(option)]
    /// script passed to the runtime.
    module: PathBuf,

    #[argh(option, default = "String::from(\"python3\")")]
    /// program that runs the module (default: python3).
    runtime: String,

    #[argh(option, default = "5")]
    /// seconds a stopped command gets to exit before it is killed.
    stop_grace: u64,

    #[argh(positional, greedy)]
    /// command path followed by name=value pairs, run once and exit.
    command: Vec<String>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
    if let Err(e) = result {
        eprintln!("logging initialization failed: {e}");
    }
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let args: Args = argh::from_env();

    let tree = SchemaCommand::from_file(&args.tree)?;
    let executor = Executor::new(ExecutorConfig {
        stop_grace: Duration::from_secs(args.stop_grace),
        ..ExecutorConfig::default()
    });
    let runner = Runner::new(&tree, ArgvBuilder::new(args.runtime, args.module))
        .with_executor(executor);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("can't start the async runtime")?;

    if args.command.is_empty() {
        return Repl::new(&runner, &runtime).run();
    }

    for diagnostic in runner.diagnostics() {
        eprintln!("warning: {diagnostic}");
    }
    let Some((path, words)) = args.command.split_first() else {
        bail!("expected a command path");
    };

    let values = assignments(runner.command(path)?, words)?;

    let state = runtime.block_on(async {
        let handle = runner.run_raw(path, values, ConsoleSink).await?;
        if let Some(e) = handle.start_error() {
            bail!("{e}");
        }
        Ok::<_, anyhow::Error>(tokio::select! {
            state = handle.wait() => state,
            _ = tokio::signal::ctrl_c() => handle.stop().await,
        })
    })?;

    let code = match state {
        ExecutionState::Completed { exit_code } | ExecutionState::Terminated { exit_code } => exit_code,
        ExecutionState::Running | ExecutionState::FailedToStart => 1,
    };
    std::process::exit(code);
}
