//! # sandcrate-exec
//!
//! Runs one plugin on a Sandcrate runtime and streams its output.
//!
//! ## Architecture
//!
//! This is Layer 3 - the command-line binary that ties together:
//! - sandcrate-exec-core: Core types and configuration
//! - sandcrate-exec-transport: Connection and wire codec
//! - sandcrate-exec-session: Execution lifecycle

use clap::Parser;
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

use sandcrate_exec::{render_line, Cli, Command, RunArgs, RunReport};
use sandcrate_exec_core::ExecutorConfig;
use sandcrate_exec_session::PluginExecutor;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    // Initialize logging; stdout is reserved for plugin output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_filter(&config))),
        )
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Command::Schema => {
            let schema = schemars::schema_for!(ExecutorConfig);
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
        Command::Run(args) => run(args, &config).await,
    }
}

async fn run(args: &RunArgs, config: &ExecutorConfig) -> anyhow::Result<()> {
    let plugin = args.plugin();
    let command = args.command(config)?;
    let deadline = Instant::now() + command.timeout();
    let stream = !args.json;

    let mut executor = PluginExecutor::from_config(config)?;
    tracing::info!(
        "sandcrate-exec v{} running {}",
        env!("CARGO_PKG_VERSION"),
        plugin
    );

    executor.start(&plugin, command).await?;
    if stream {
        print_new_lines(&mut executor);
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    while !executor.status().is_terminal() {
        tokio::select! {
            next = executor.process_next() => {
                if next.is_none() {
                    break;
                }
            }
            _ = tokio::time::sleep_until(deadline) => {
                tracing::warn!("Advisory timeout elapsed, stopping {}", plugin);
                executor.stop();
            }
            _ = &mut ctrl_c => {
                tracing::info!("Interrupted, stopping {}", plugin);
                executor.stop();
            }
        }
        if stream {
            print_new_lines(&mut executor);
        }
    }

    let report = RunReport::capture(&executor);
    executor.dispose();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        eprintln!("{}", report.summary());
    }

    if !report.succeeded() {
        anyhow::bail!("run ended with status {}", report.status);
    }
    Ok(())
}

fn print_new_lines(executor: &mut PluginExecutor) {
    for line in executor.read_since_last() {
        println!("{}", render_line(line));
    }
}
