//! Error types for the reconciliation engine.

use std::fmt;
use std::time::Duration;

use nbr_id::ResourceName;
use thiserror::Error;

use crate::config::Field;
use crate::status::{LifecycleStatus, WaitTarget};

/// Errors returned by a control-plane client.
///
/// `NotFound` is kept apart from every other failure: poll loops treat it as
/// the absence signal, everything else is fatal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// The named resource does not exist.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The control plane rejected the request.
    #[error("control plane error ({code}): {message}")]
    Api { code: String, message: String },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Create an API error from a code and message.
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Returns true if the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Remote call that produced a [`ClientError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RemoteCall {
    Create,
    Describe,
    Update,
    Start,
    Stop,
    Delete,
    ListTags,
    AddTags,
    RemoveTags,
}

impl fmt::Display for RemoteCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Describe => "describe",
            Self::Update => "update",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Delete => "delete",
            Self::ListTags => "list tags",
            Self::AddTags => "add tags",
            Self::RemoveTags => "remove tags",
        };
        f.write_str(s)
    }
}

/// Reconciliation errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The resource does not exist.
    #[error("notebook instance {name} not found")]
    NotFound { name: ResourceName },

    /// A status wait exceeded its deadline.
    #[error("timed out after {elapsed:?} waiting for {name} to become {target}")]
    Timeout {
        name: ResourceName,
        target: WaitTarget,
        elapsed: Duration,
    },

    /// Delete was issued but the resource never disappeared.
    #[error("{name} still present after {elapsed:?} of delete polling")]
    RetryExhausted {
        name: ResourceName,
        elapsed: Duration,
    },

    /// Any control-plane failure other than not-found.
    #[error("{call} call for {name} failed")]
    Remote {
        name: ResourceName,
        call: RemoteCall,
        #[source]
        source: ClientError,
    },

    /// A wait settled on a terminal status other than the one required.
    #[error("{name} settled in {actual} while waiting for {expected}{}", reason_suffix(.failure_reason))]
    UnexpectedStatus {
        name: ResourceName,
        expected: LifecycleStatus,
        actual: LifecycleStatus,
        failure_reason: Option<String>,
    },

    /// The update failed after the instance was stopped from `InService`.
    ///
    /// No restart is attempted; the instance stays stopped until the caller
    /// acts.
    #[error("update of {name} failed and the instance was left stopped")]
    LeftStopped {
        name: ResourceName,
        #[source]
        source: Box<ReconcileError>,
    },

    /// The change touches fields that cannot be modified after creation.
    #[error("changing {} requires replacing {name}", field_list(.fields))]
    RequiresReplacement {
        name: ResourceName,
        fields: Vec<Field>,
    },

    /// The wait was interrupted by the cancellation signal.
    #[error("wait for {name} cancelled")]
    Cancelled { name: ResourceName },

    /// Tag synchronisation failed.
    #[error("tag {call} for {name} failed")]
    Tags {
        name: ResourceName,
        call: RemoteCall,
        #[source]
        source: ClientError,
    },
}

impl ReconcileError {
    pub(crate) fn remote(name: &ResourceName, call: RemoteCall, source: ClientError) -> Self {
        Self::Remote {
            name: name.clone(),
            call,
            source,
        }
    }

    pub(crate) fn not_found(name: &ResourceName) -> Self {
        Self::NotFound { name: name.clone() }
    }

    /// Returns true if the error means the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Remote { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Returns true if a deadline was exceeded.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::RetryExhausted { .. })
    }
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason
        .as_deref()
        .map(|r| format!(" ({r})"))
        .unwrap_or_default()
}

fn field_list(fields: &[Field]) -> String {
    fields
        .iter()
        .map(Field::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Lifecycle operation exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    Plan,
    Apply,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Plan => "plan",
            Self::Apply => "apply",
        };
        f.write_str(s)
    }
}

/// A failed lifecycle operation, with the resource identity attached.
#[derive(Debug, Error)]
#[error("{operation} of notebook instance {name} failed")]
pub struct LifecycleError {
    pub name: ResourceName,
    pub operation: Operation,
    #[source]
    pub source: ReconcileError,
}

impl LifecycleError {
    pub fn new(name: &ResourceName, operation: Operation, source: ReconcileError) -> Self {
        Self {
            name: name.clone(),
            operation,
            source,
        }
    }

    /// Returns true if the instance was left stopped by a failed update.
    pub fn left_stopped(&self) -> bool {
        matches!(self.source, ReconcileError::LeftStopped { .. })
    }
}
