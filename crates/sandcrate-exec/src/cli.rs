//! Command-line argument parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use sandcrate_exec_core::{ExecutionCommand, ExecutorConfig, PluginRef, Result};

/// Run Sandcrate plugins and stream their output.
#[derive(Debug, Parser)]
#[command(
    name = "sandcrate-exec",
    version,
    about = "Run Sandcrate plugins and stream their output"
)]
pub struct Cli {
    /// Configuration file (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Execute a plugin and stream its output
    Run(RunArgs),
    /// Print the JSON Schema of the configuration file
    Schema,
}

/// Arguments of `run`. Endpoint flags override the configuration file.
#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Plugin identifier
    #[arg(long)]
    pub plugin_id: String,

    /// Display name (defaults to the identifier)
    #[arg(long)]
    pub name: Option<String>,

    /// Parameters as JSON; blank means `{}`
    #[arg(long)]
    pub params: Option<String>,

    /// Advisory timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Runtime host
    #[arg(long)]
    pub host: Option<String>,

    /// Runtime port
    #[arg(long)]
    pub port: Option<u16>,

    /// Use the encrypted transport (wss)
    #[arg(long)]
    pub secure: bool,

    /// Bearer token for the upgrade request
    #[arg(long)]
    pub token: Option<String>,

    /// Print a JSON report when the run ends instead of streaming lines
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Load the configuration file, apply flag overrides, and validate.
    pub fn load_config(&self) -> Result<ExecutorConfig> {
        let mut config = match &self.config {
            Some(path) => ExecutorConfig::from_file(path)?,
            None => ExecutorConfig::default(),
        };
        if let Command::Run(args) = &self.command {
            args.apply_overrides(&mut config);
        }
        config.validate()?;
        Ok(config)
    }

    /// Default log filter when `RUST_LOG` is not set.
    pub fn log_filter(&self, config: &ExecutorConfig) -> String {
        let level = match self.verbose {
            0 => config.logging.level.as_str(),
            1 => "debug",
            _ => "trace",
        };
        format!(
            "sandcrate_exec={level},sandcrate_exec_core={level},\
             sandcrate_exec_transport={level},sandcrate_exec_session={level}"
        )
    }
}

impl RunArgs {
    /// Overwrite configuration values with the flags that were given.
    pub fn apply_overrides(&self, config: &mut ExecutorConfig) {
        if let Some(host) = &self.host {
            config.endpoint.host = host.clone();
        }
        if let Some(port) = self.port {
            config.endpoint.port = port;
        }
        if self.secure {
            config.endpoint.secure = true;
        }
        if let Some(token) = &self.token {
            config.auth.bearer_token = Some(token.clone());
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.execution.default_timeout_ms = timeout_ms;
        }
    }

    /// The plugin to run.
    pub fn plugin(&self) -> PluginRef {
        let name = self.name.clone().unwrap_or_else(|| self.plugin_id.clone());
        PluginRef::new(self.plugin_id.clone(), name)
    }

    /// Build the execute command from the parameter text.
    pub fn command(&self, config: &ExecutorConfig) -> Result<ExecutionCommand> {
        ExecutionCommand::from_json_text(
            &self.plugin(),
            self.params.as_deref().unwrap_or_default(),
            config.execution.default_timeout_ms,
        )
    }
}
