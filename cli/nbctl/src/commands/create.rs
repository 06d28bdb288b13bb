//! `nbctl create`

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use nbr_reconcile::LifecycleStatus;

use crate::manifest::load_manifest;
use crate::output::print_record;

use super::CommandContext;

#[derive(Debug, Args)]
pub struct CreateCommand {
    /// Path to the manifest.
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    file: PathBuf,
}

impl CreateCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let desired = load_manifest(&self.file)?;
        let mut state = ctx.state()?;

        let record = ctx.orchestrator()?.create(&desired).await?;

        state.record(desired, record.clone());
        state.save()?;

        match record.status() {
            LifecycleStatus::InService => {
                ctx.announce(&format!("Notebook instance {} is in service", record.name()))
            }
            LifecycleStatus::Failed => ctx.note(&format!(
                "Notebook instance {} was created but failed to provision: {}",
                record.name(),
                record.observed.failure_reason.as_deref().unwrap_or("no reason given")
            )),
            status => ctx.note(&format!(
                "Notebook instance {} was created and is still {}",
                record.name(),
                status
            )),
        }
        print_record(&record, ctx.format);
        Ok(())
    }
}
