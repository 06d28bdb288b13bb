//! `nbctl update`

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::manifest::load_manifest;
use crate::output::print_record;

use super::CommandContext;

#[derive(Debug, Args)]
pub struct UpdateCommand {
    /// Path to the manifest.
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    file: PathBuf,
}

impl UpdateCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let desired = load_manifest(&self.file)?;
        let mut state = ctx.state()?;

        let record = ctx.orchestrator()?.update(&desired).await?;

        state.record(desired, record.clone());
        state.save()?;

        ctx.announce(&format!(
            "Notebook instance {} updated ({})",
            record.name(),
            record.status()
        ));
        print_record(&record, ctx.format);
        Ok(())
    }
}
