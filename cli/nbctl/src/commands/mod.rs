//! CLI commands.

mod apply;
mod create;
mod delete;
mod get;
mod update;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use nbr_reconcile::{Cancellation, LifecycleOrchestrator, Reconciler, ReconcilerConfig};
use tokio::sync::watch;
use tracing::warn;

use crate::client::HttpControlPlane;
use crate::config::{default_state_path, Config};
use crate::output::{print_info, print_success, OutputFormat};
use crate::state::StateFile;

/// nbctl - Reconcile notebook instances against a manifest.
#[derive(Debug, Parser)]
#[command(name = "nbctl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Control-plane endpoint URL.
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Seconds between status polls.
    #[arg(long, global = true, value_name = "SECS")]
    poll_interval: Option<u64>,

    /// Deadline in seconds for each lifecycle wait.
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    /// Path of the local state file.
    #[arg(long, global = true, value_name = "PATH")]
    state: Option<PathBuf>,

    /// Emit logs as JSON on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create a notebook instance from a manifest.
    Create(create::CreateCommand),

    /// Show a notebook instance.
    Get(get::GetCommand),

    /// Converge an existing notebook instance to a manifest.
    Update(update::UpdateCommand),

    /// Delete a notebook instance and wait until it is gone.
    Delete(delete::DeleteCommand),

    /// Create, update or replace a notebook instance to match a manifest.
    Apply(apply::ApplyCommand),

    /// Show what `apply` would do.
    Plan(apply::PlanCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        let format = self.format;

        let mut config = Config::load()?;
        if let Some(endpoint) = self.endpoint {
            config.endpoint = endpoint;
        }
        if let Some(secs) = self.poll_interval {
            config.poll_interval_secs = secs;
        }
        if let Some(secs) = self.timeout {
            config.timeout_secs = secs;
        }

        crate::init_tracing(&config.log_level, self.log_json);

        let state_path = match self.state {
            Some(path) => path,
            None => default_state_path()?,
        };

        let ctx = CommandContext {
            config,
            format,
            state_path,
            cancel: cancel_on_ctrl_c(),
        };

        match self.command {
            Commands::Create(cmd) => cmd.run(ctx).await,
            Commands::Get(cmd) => cmd.run(ctx).await,
            Commands::Update(cmd) => cmd.run(ctx).await,
            Commands::Delete(cmd) => cmd.run(ctx).await,
            Commands::Apply(cmd) => cmd.run(ctx).await,
            Commands::Plan(cmd) => cmd.run(ctx).await,
            Commands::Version => {
                println!("nbctl {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        }
    }
}

/// Raise the cancellation flag on the first Ctrl-C.
fn cancel_on_ctrl_c() -> Cancellation {
    let (cancel_tx, cancel_rx) = watch::channel(false);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling wait");
            let _ = cancel_tx.send(true);
        }
    });

    Cancellation::from_watch(cancel_rx)
}

/// Shared command context.
pub struct CommandContext {
    pub config: Config,
    pub format: OutputFormat,
    pub state_path: PathBuf,
    pub cancel: Cancellation,
}

impl CommandContext {
    /// Build the lifecycle orchestrator over the HTTP control plane.
    pub fn orchestrator(&self) -> Result<LifecycleOrchestrator> {
        let client = Arc::new(HttpControlPlane::new(
            &self.config.endpoint,
            self.config.token.as_deref(),
        )?);

        let reconciler_config = ReconcilerConfig::default()
            .with_poll_interval(self.config.poll_interval())
            .with_timeout(self.config.timeout());

        let reconciler = Reconciler::new(client.clone(), reconciler_config)
            .with_cancellation(self.cancel.clone());

        Ok(LifecycleOrchestrator::new(reconciler, client))
    }

    pub fn state(&self) -> Result<StateFile> {
        StateFile::load(&self.state_path)
    }

    /// Print a success line in table mode; JSON output stays a single document.
    pub fn announce(&self, message: &str) {
        if matches!(self.format, OutputFormat::Table) {
            print_success(message);
        }
    }

    /// Print an info line in table mode.
    pub fn note(&self, message: &str) {
        if matches!(self.format, OutputFormat::Table) {
            print_info(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_flag_accepts_known_formats() {
        let cli = Cli::try_parse_from(["nbctl", "--format", "json", "version"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);

        let cli = Cli::try_parse_from(["nbctl", "version"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Table);
    }

    #[test]
    fn format_flag_rejects_unknown_format() {
        let err = Cli::try_parse_from(["nbctl", "--format", "yaml", "version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }
}
