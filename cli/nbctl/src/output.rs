//! Output formatting for CLI commands.

use clap::ValueEnum;
use colored::Colorize;
use nbr_reconcile::{ConfigDiff, DesiredConfig, Field, LifecycleStatus, Plan, ResourceRecord};
use serde::Serialize;
use tabled::{Table, Tabled};

const CLI_SCHEMA_VERSION: &str = "nbctl.v1";

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON format.
    Json,
}

/// Print data in the specified format.
pub fn print_output<T: Serialize + Tabled>(data: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if data.is_empty() {
                println!("{}", "No items found.".dimmed());
            } else {
                let table = Table::new(data).to_string();
                println!("{}", table);
            }
        }
        OutputFormat::Json => println!("{}", format_json(data, "[]")),
    }
}

/// Print a single item as JSON.
pub fn print_single<T: Serialize>(data: &T) {
    println!("{}", format_json(data, "{}"));
}

/// Print a success message.
pub fn print_success(message: &str) {
    println!("{} {}", "Success:".green().bold(), message);
}

/// Print an info message.
pub fn print_info(message: &str) {
    println!("{} {}", "Info:".blue().bold(), message);
}

/// Table row for one notebook instance.
#[derive(Debug, Serialize, Tabled)]
pub struct InstanceRow {
    #[tabled(rename = "Name")]
    name: String,

    #[tabled(rename = "Status")]
    status: String,

    #[tabled(rename = "Type")]
    instance_type: String,

    #[tabled(rename = "URL")]
    url: String,

    #[tabled(rename = "Failure")]
    failure_reason: String,

    #[tabled(rename = "Modified")]
    last_modified: String,
}

impl From<&ResourceRecord> for InstanceRow {
    fn from(record: &ResourceRecord) -> Self {
        let observed = &record.observed;
        Self {
            name: observed.name.to_string(),
            status: colored_status(observed.status),
            instance_type: observed.instance_type.clone(),
            url: display_option(&observed.url),
            failure_reason: display_option(&observed.failure_reason),
            last_modified: observed
                .last_modified_time
                .or(observed.creation_time)
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// Print a record: a one-row table, or the full record as JSON.
pub fn print_record(record: &ResourceRecord, format: OutputFormat) {
    match format {
        OutputFormat::Table => print_output(&[InstanceRow::from(record)], format),
        OutputFormat::Json => print_single(record),
    }
}

/// One changed field in a plan.
#[derive(Debug, Serialize, Tabled)]
pub struct ChangeRow {
    #[tabled(rename = "Field")]
    field: &'static str,

    #[tabled(rename = "Change")]
    change: &'static str,

    #[tabled(rename = "Current")]
    current: String,

    #[tabled(rename = "Desired")]
    desired: String,
}

/// Per-field rows for a diff.
pub fn change_rows(current: &DesiredConfig, desired: &DesiredConfig) -> Vec<ChangeRow> {
    ConfigDiff::between(current, desired)
        .changed()
        .map(|field| ChangeRow {
            field: field.as_str(),
            change: change_label(field),
            current: current.field_value(field),
            desired: desired.field_value(field),
        })
        .collect()
}

fn change_label(field: Field) -> &'static str {
    use nbr_reconcile::FieldClass;
    match field.class() {
        FieldClass::ForceNew => "replace",
        FieldClass::RequiresRestart => "restart",
        FieldClass::InPlace => "in place",
    }
}

#[derive(Serialize)]
struct PlanOutput<'a> {
    name: &'a str,
    action: &'static str,
    interrupts_service: bool,
    changes: Vec<ChangeRow>,
}

pub fn print_plan(plan: &Plan, desired: &DesiredConfig, format: OutputFormat) {
    let changes = match plan {
        Plan::Create | Plan::Noop(_) => Vec::new(),
        Plan::Update { current, .. } | Plan::Replace { current, .. } => {
            change_rows(&current.current_config(), desired)
        }
    };

    match format {
        OutputFormat::Table => {
            println!(
                "{} {} {}",
                "Plan:".bold(),
                desired.name,
                plan.to_string().cyan()
            );
            if plan.interrupts_service() {
                println!(
                    "{}",
                    "Applying this plan stops the instance.".yellow()
                );
            }
            if !changes.is_empty() {
                println!("{}", Table::new(&changes));
            }
        }
        OutputFormat::Json => print_single(&PlanOutput {
            name: desired.name.as_str(),
            action: plan.action(),
            interrupts_service: plan.interrupts_service(),
            changes,
        }),
    }
}

fn colored_status(status: LifecycleStatus) -> String {
    let text = status.to_string();
    match status {
        LifecycleStatus::InService => text.green().to_string(),
        LifecycleStatus::Failed => text.red().to_string(),
        LifecycleStatus::Stopped | LifecycleStatus::Absent => text.dimmed().to_string(),
        _ => text.yellow().to_string(),
    }
}

fn display_option(opt: &Option<String>) -> String {
    opt.as_deref().unwrap_or("-").to_string()
}

fn format_json<T: Serialize + ?Sized>(data: &T, fallback: &str) -> String {
    let value = serde_json::to_value(data).unwrap_or_else(|_| serde_json::json!({}));
    let wrapped = serde_json::json!({
        "schemaVersion": CLI_SCHEMA_VERSION,
        "data": value
    });
    serde_json::to_string_pretty(&wrapped).unwrap_or_else(|_| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nbr_id::ResourceName;

    fn config() -> DesiredConfig {
        DesiredConfig::new(ResourceName::parse("nb-1").unwrap(), "role", "small")
    }

    #[test]
    fn change_rows_label_each_class() {
        let desired = DesiredConfig {
            instance_type: "large".into(),
            ..config()
        }
        .with_subnet("subnet-1")
        .with_tag("team", "ml");

        let rows = change_rows(&config(), &desired);
        let labels: Vec<_> = rows.iter().map(|r| (r.field, r.change)).collect();
        assert_eq!(
            labels,
            vec![
                ("instance_type", "restart"),
                ("subnet_id", "replace"),
                ("tags", "in place"),
            ]
        );
        assert_eq!(rows[1].current, "-");
        assert_eq!(rows[1].desired, "subnet-1");
    }

    #[test]
    fn json_output_is_wrapped_with_schema() {
        let out = format_json(&serde_json::json!({ "name": "nb-1" }), "{}");
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["schemaVersion"], CLI_SCHEMA_VERSION);
        assert_eq!(value["data"]["name"], "nb-1");
    }
}
