//! Error handling and display for the CLI.

use colored::Colorize;
use nbr_reconcile::{ClientError, LifecycleError, ReconcileError};
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Manifest(String),
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    if let Some(hint) = hint_for(err) {
        eprintln!("\n{}", format!("Hint: {hint}").yellow());
    }
}

fn hint_for(err: &anyhow::Error) -> Option<&'static str> {
    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        return match cli_err {
            CliError::Manifest(_) => Some(
                "Manifest keys: name, role_arn, instance_type, subnet_id, security_groups, kms_key_id, [tags].",
            ),
        };
    }

    let lifecycle = err.downcast_ref::<LifecycleError>()?;
    match &lifecycle.source {
        ReconcileError::LeftStopped { .. } => Some(
            "The instance was stopped for the update and left stopped. Fix the cause and run `nbctl update` again.",
        ),
        ReconcileError::RequiresReplacement { .. } => {
            Some("Use `nbctl apply` to replace the instance, or revert the immutable fields.")
        }
        ReconcileError::Timeout { .. } | ReconcileError::RetryExhausted { .. } => {
            Some("The control plane may still be working. Check with `nbctl get`, or raise --timeout.")
        }
        ReconcileError::Cancelled { .. } => {
            Some("The wait was interrupted; the instance may still be transitioning.")
        }
        other => client_hint(root_client_error(other)?),
    }
}

fn root_client_error(err: &ReconcileError) -> Option<&ClientError> {
    match err {
        ReconcileError::Remote { source, .. } | ReconcileError::Tags { source, .. } => {
            Some(source)
        }
        ReconcileError::LeftStopped { source, .. } => root_client_error(source),
        _ => None,
    }
}

fn client_hint(err: &ClientError) -> Option<&'static str> {
    match err {
        ClientError::Transport(_) => {
            Some("Check your network connection and the endpoint (--endpoint or NBCTL_ENDPOINT).")
        }
        ClientError::Api { code, .. } if code == "Unauthorized" || code == "AccessDenied" => {
            Some("Check the credentials in NBCTL_TOKEN.")
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nbr_id::ResourceName;
    use nbr_reconcile::{Operation, RemoteCall};

    fn lifecycle(source: ReconcileError) -> anyhow::Error {
        let name = ResourceName::parse("nb-1").unwrap();
        LifecycleError::new(&name, Operation::Update, source).into()
    }

    #[test]
    fn left_stopped_gets_hint() {
        let name = ResourceName::parse("nb-1").unwrap();
        let err = lifecycle(ReconcileError::LeftStopped {
            name: name.clone(),
            source: Box::new(ReconcileError::Remote {
                name,
                call: RemoteCall::Update,
                source: ClientError::api("ValidationException", "bad type"),
            }),
        });
        assert!(hint_for(&err).unwrap().contains("left stopped"));
    }

    #[test]
    fn transport_error_gets_network_hint() {
        let name = ResourceName::parse("nb-1").unwrap();
        let err = lifecycle(ReconcileError::Remote {
            name,
            call: RemoteCall::Describe,
            source: ClientError::Transport("connection refused".into()),
        });
        assert!(hint_for(&err).unwrap().contains("endpoint"));
    }

    #[test]
    fn plain_errors_have_no_hint() {
        assert!(hint_for(&anyhow::anyhow!("boom")).is_none());
    }
}
