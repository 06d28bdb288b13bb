//! Reconciliation engine for notebook instances.
//!
//! Drives a remotely managed, asynchronously provisioned notebook instance
//! toward a declared configuration. Key concepts:
//!
//! - **Desired config**: what the caller declared ([`DesiredConfig`]).
//! - **Observed state**: a fresh snapshot from the control plane
//!   ([`ObservedState`]), never cached or mutated.
//! - **Convergence**: the stop, update and restart choreography that moves
//!   one into the other ([`Reconciler`]).
//!
//! # Invariants
//!
//! - One remote call in flight at a time; every wait has a deadline
//! - Not-found is the only absence signal and is never retried
//! - Restart-class updates are only issued against a stopped instance
//! - An instance is only restarted if it was in service before the update

use std::time::Duration;

mod client;
mod config;
mod error;
mod observed;
mod orchestrator;
mod plan;
mod poller;
mod reconciler;
mod status;
mod tags;

pub mod mock;

pub use client::{ResourceClient, UpdateRequest};
pub use config::{ConfigDiff, DesiredConfig, Field, FieldClass};
pub use error::{ClientError, LifecycleError, Operation, ReconcileError, RemoteCall};
pub use observed::{ObservedState, ReadOutcome, ResourceRecord};
pub use orchestrator::{Applied, ApplyReport, LifecycleOrchestrator};
pub use plan::Plan;
pub use poller::{Cancellation, StatusPoller, WaitOutcome, MIN_POLL_INTERVAL};
pub use reconciler::{Reconciler, ReconcilerConfig, StopOutcome, StoppedInstance, UpdatePath};
pub use status::{LifecycleStatus, StatusParseError, WaitTarget};
pub use tags::{
    diff_tags, strip_reserved, sync_tags, TagClient, TagDiff, Tags, RESERVED_TAG_PREFIX,
};

/// Default interval between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default deadline for every lifecycle wait.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(10 * 60); // 10 minutes
