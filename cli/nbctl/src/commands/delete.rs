//! `nbctl delete`

use anyhow::Result;
use clap::Args;
use nbr_id::ResourceName;

use crate::output::{print_single, OutputFormat};

use super::CommandContext;

#[derive(Debug, Args)]
pub struct DeleteCommand {
    /// Notebook instance name.
    name: ResourceName,
}

impl DeleteCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let mut state = ctx.state()?;

        ctx.orchestrator()?.delete(&self.name).await?;

        if state.forget(&self.name) {
            state.save()?;
        }

        match ctx.format {
            OutputFormat::Table => {
                ctx.announce(&format!("Notebook instance {} deleted", self.name))
            }
            OutputFormat::Json => print_single(&serde_json::json!({
                "name": self.name.as_str(),
                "status": "Absent"
            })),
        }
        Ok(())
    }
}
