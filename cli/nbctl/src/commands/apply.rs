//! `nbctl apply` and `nbctl plan`

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use nbr_reconcile::Applied;

use crate::manifest::load_manifest;
use crate::output::{print_plan, print_record};

use super::CommandContext;

#[derive(Debug, Args)]
pub struct ApplyCommand {
    /// Path to the manifest.
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    file: PathBuf,
}

impl ApplyCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let desired = load_manifest(&self.file)?;
        let mut state = ctx.state()?;

        let report = ctx.orchestrator()?.apply(&desired).await?;

        state.record(desired, report.record.clone());
        state.save()?;

        let name = report.record.name();
        let message = match report.applied {
            Applied::Created => format!("Notebook instance {name} created"),
            Applied::Unchanged => format!("Notebook instance {name} already up to date"),
            Applied::Updated { restarted: true } => {
                format!("Notebook instance {name} updated and restarted")
            }
            Applied::Updated { restarted: false } => format!("Notebook instance {name} updated"),
            Applied::Replaced => format!("Notebook instance {name} replaced"),
        };
        ctx.announce(&message);
        print_record(&report.record, ctx.format);
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct PlanCommand {
    /// Path to the manifest.
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    file: PathBuf,
}

impl PlanCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let desired = load_manifest(&self.file)?;
        let plan = ctx.orchestrator()?.plan(&desired).await?;
        print_plan(&plan, &desired, ctx.format);
        Ok(())
    }
}
