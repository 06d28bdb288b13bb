//! `nbctl get`

use anyhow::Result;
use clap::Args;
use nbr_id::ResourceName;
use nbr_reconcile::ReadOutcome;
use tabled::Table;

use crate::output::{change_rows, print_record, print_single, OutputFormat};

use super::CommandContext;

#[derive(Debug, Args)]
pub struct GetCommand {
    /// Notebook instance name.
    name: ResourceName,
}

impl GetCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let mut state = ctx.state()?;

        match ctx.orchestrator()?.read(&self.name).await? {
            ReadOutcome::Found(record) => {
                let drift = state
                    .get(&self.name)
                    .map(|entry| change_rows(&record.current_config(), &entry.config))
                    .unwrap_or_default();

                state.refresh(record.clone());
                state.save()?;

                print_record(&record, ctx.format);
                if !drift.is_empty() && matches!(ctx.format, OutputFormat::Table) {
                    ctx.note("Live configuration differs from the last applied manifest:");
                    println!("{}", Table::new(&drift));
                }
            }
            ReadOutcome::Gone => {
                if state.forget(&self.name) {
                    state.save()?;
                }

                match ctx.format {
                    OutputFormat::Table => {
                        ctx.note(&format!("Notebook instance {} does not exist", self.name))
                    }
                    OutputFormat::Json => print_single(&serde_json::json!({
                        "name": self.name.as_str(),
                        "status": "Absent"
                    })),
                }
            }
        }

        Ok(())
    }
}
