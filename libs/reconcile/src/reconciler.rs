//! Lifecycle reconciler.
//!
//! Drives one notebook instance through create, update and delete against an
//! eventually consistent control plane:
//!
//! - create: `Pending -> InService | Failed`
//! - update: `InService -> Stopping -> Stopped -> Updating -> Stopped [-> InService]`
//! - delete: `InService | Stopped -> Stopping -> Stopped -> Deleting -> Absent`
//!
//! The create wait is best effort. Every other wait is fatal on timeout.

use std::sync::Arc;
use std::time::Duration;

use nbr_id::ResourceName;
use tracing::{debug, info, instrument, warn};

use crate::client::{ResourceClient, UpdateRequest};
use crate::config::{ConfigDiff, DesiredConfig, FieldClass};
use crate::error::{ReconcileError, RemoteCall};
use crate::observed::ObservedState;
use crate::poller::{Cancellation, StatusPoller, WaitOutcome, MIN_POLL_INTERVAL};
use crate::status::{LifecycleStatus, WaitTarget};
use crate::{DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT};

/// Reconciler timing configuration.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Interval between status polls.
    pub poll_interval: Duration,

    /// Best-effort wait for a new instance to come into service.
    pub create_timeout: Duration,

    pub stop_timeout: Duration,

    pub start_timeout: Duration,

    /// Wait for an applied update to settle back to `Stopped`.
    pub update_timeout: Duration,

    /// Ceiling for delete-until-gone polling.
    pub delete_timeout: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            create_timeout: DEFAULT_WAIT_TIMEOUT,
            stop_timeout: DEFAULT_WAIT_TIMEOUT,
            start_timeout: DEFAULT_WAIT_TIMEOUT,
            update_timeout: DEFAULT_WAIT_TIMEOUT,
            delete_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }
}

impl ReconcilerConfig {
    /// Use the same timeout for every wait.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.create_timeout = timeout;
        self.stop_timeout = timeout;
        self.start_timeout = timeout;
        self.update_timeout = timeout;
        self.delete_timeout = timeout;
        self
    }

    /// Set the poll interval, raised to at least [`MIN_POLL_INTERVAL`].
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }
}

/// Proof that an instance was observed `Stopped`.
///
/// Restart-class updates can only be issued through this type, so the stop
/// choreography cannot be skipped.
#[derive(Debug, Clone)]
pub struct StoppedInstance {
    state: ObservedState,
}

impl StoppedInstance {
    pub fn state(&self) -> &ObservedState {
        &self.state
    }
}

/// Result of stopping an instance.
#[derive(Debug, Clone)]
pub enum StopOutcome {
    Stopped(StoppedInstance),

    /// The instance does not exist.
    Absent,
}

/// How an update was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePath {
    /// No restart-class field changed; nothing was sent.
    Noop,

    /// Stop, update, and a restart if the instance had been in service.
    Applied { restarted: bool },
}

/// The lifecycle reconciler.
pub struct Reconciler {
    client: Arc<dyn ResourceClient>,
    poller: StatusPoller,
    config: ReconcilerConfig,
}

impl Reconciler {
    /// Create a new reconciler over an injected client.
    pub fn new(client: Arc<dyn ResourceClient>, config: ReconcilerConfig) -> Self {
        let poller = StatusPoller::new(Arc::clone(&client), config.poll_interval);
        Self {
            client,
            poller,
            config,
        }
    }

    /// Interrupt waits when the given signal is raised.
    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.poller = self.poller.with_cancellation(cancel);
        self
    }

    /// Fetch a fresh snapshot; `None` if the instance does not exist.
    pub async fn describe(
        &self,
        name: &ResourceName,
    ) -> Result<Option<ObservedState>, ReconcileError> {
        match self.client.describe(name).await {
            Ok(state) => Ok(Some(state)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(ReconcileError::remote(name, RemoteCall::Describe, e)),
        }
    }

    /// Create the instance and wait, best effort, for it to come into service.
    ///
    /// A failed or timed-out wait is logged and the identity is still
    /// returned: the instance exists and the caller reads back whatever state
    /// it is in.
    #[instrument(skip(self, desired), fields(name = %desired.name))]
    pub async fn create_resource(
        &self,
        desired: &DesiredConfig,
    ) -> Result<ResourceName, ReconcileError> {
        let name = self
            .client
            .create(desired)
            .await
            .map_err(|e| ReconcileError::remote(&desired.name, RemoteCall::Create, e))?;

        info!(instance_type = %desired.instance_type, "Notebook instance creation requested");

        let target = WaitTarget::statuses([LifecycleStatus::InService, LifecycleStatus::Failed]);
        match self
            .poller
            .wait_for(&name, &target, self.config.create_timeout)
            .await
        {
            Ok(WaitOutcome::Reached(state)) if state.status == LifecycleStatus::Failed => {
                warn!(
                    failure_reason = state.failure_reason.as_deref().unwrap_or("unknown"),
                    "Notebook instance failed to provision"
                );
            }
            Ok(WaitOutcome::Reached(_)) => {
                info!("Notebook instance in service");
            }
            Ok(WaitOutcome::Absent) => {
                warn!("Notebook instance not visible after create");
            }
            Err(e) => {
                warn!(error = %e, "Notebook instance did not come into service, continuing");
            }
        }

        Ok(name)
    }

    /// Converge a running or stopped instance from `current` to `desired`.
    ///
    /// Restart-class changes run as stop, update, and a restart only if the
    /// instance was `InService` before the update started. Changes that need
    /// no restart are not sent at all; force-new changes are rejected before
    /// anything is touched.
    #[instrument(skip(self, current, desired), fields(name = %name))]
    pub async fn update_resource(
        &self,
        name: &ResourceName,
        current: &DesiredConfig,
        desired: &DesiredConfig,
    ) -> Result<UpdatePath, ReconcileError> {
        let diff = ConfigDiff::between(current, desired);

        let force_new = diff.fields_of(FieldClass::ForceNew);
        if !force_new.is_empty() {
            return Err(ReconcileError::RequiresReplacement {
                name: name.clone(),
                fields: force_new,
            });
        }

        let Some(request) = diff.update_request(desired) else {
            debug!(changes = %diff, "No restart-class changes, skipping update call");
            return Ok(UpdatePath::Noop);
        };

        let prior_status = self
            .describe(name)
            .await?
            .ok_or_else(|| ReconcileError::not_found(name))?
            .status;
        let was_running = prior_status == LifecycleStatus::InService;

        info!(
            prior_status = %prior_status,
            changes = %diff,
            "Stopping notebook instance to apply update"
        );

        let stopped = match self.stop_resource(name).await? {
            StopOutcome::Stopped(stopped) => stopped,
            StopOutcome::Absent => return Err(ReconcileError::not_found(name)),
        };

        if let Err(e) = self.apply_update(&stopped, &request).await {
            return Err(if was_running {
                ReconcileError::LeftStopped {
                    name: name.clone(),
                    source: Box::new(e),
                }
            } else {
                e
            });
        }

        if was_running {
            self.start_resource(name).await?;
            info!("Notebook instance updated and restarted");
        } else {
            info!(prior_status = %prior_status, "Notebook instance updated, left stopped");
        }

        Ok(UpdatePath::Applied {
            restarted: was_running,
        })
    }

    /// Stop, delete, and poll until describe reports not-found.
    ///
    /// An instance that is already gone is success without a delete call.
    #[instrument(skip(self), fields(name = %name))]
    pub async fn delete_resource(&self, name: &ResourceName) -> Result<(), ReconcileError> {
        if let StopOutcome::Absent = self.stop_resource(name).await? {
            info!("Notebook instance already gone");
            return Ok(());
        }

        match self.client.delete(name).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                info!("Notebook instance gone before delete");
                return Ok(());
            }
            Err(e) => return Err(ReconcileError::remote(name, RemoteCall::Delete, e)),
        }

        info!("Notebook instance deletion requested");

        match self
            .poller
            .wait_for(name, &WaitTarget::Absent, self.config.delete_timeout)
            .await
        {
            Ok(WaitOutcome::Absent) => {
                info!("Notebook instance deleted");
                Ok(())
            }
            Ok(WaitOutcome::Reached(state)) => Err(ReconcileError::UnexpectedStatus {
                name: name.clone(),
                expected: LifecycleStatus::Absent,
                actual: state.status,
                failure_reason: state.failure_reason,
            }),
            Err(ReconcileError::Timeout { elapsed, .. }) => {
                Err(ReconcileError::RetryExhausted {
                    name: name.clone(),
                    elapsed,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Stop the instance and wait for `Stopped`.
    ///
    /// Stopping an instance that is already stopped or gone succeeds. If the
    /// control plane rejects the stop, a fresh describe decides: `Stopped` or
    /// not-found is success, anything else returns the rejection.
    #[instrument(skip(self), fields(name = %name))]
    pub async fn stop_resource(&self, name: &ResourceName) -> Result<StopOutcome, ReconcileError> {
        if let Err(e) = self.client.stop(name).await {
            if e.is_not_found() {
                return Ok(StopOutcome::Absent);
            }

            return match self.describe(name).await {
                Ok(None) => Ok(StopOutcome::Absent),
                Ok(Some(state)) if state.status == LifecycleStatus::Stopped => {
                    debug!(error = %e, "Stop rejected, instance already stopped");
                    Ok(StopOutcome::Stopped(StoppedInstance { state }))
                }
                _ => Err(ReconcileError::remote(name, RemoteCall::Stop, e)),
            };
        }

        debug!("Stop requested");

        match self
            .settle(name, LifecycleStatus::Stopped, self.config.stop_timeout)
            .await?
        {
            Some(state) => Ok(StopOutcome::Stopped(StoppedInstance { state })),
            None => Ok(StopOutcome::Absent),
        }
    }

    /// Start the instance and wait for `InService`.
    #[instrument(skip(self), fields(name = %name))]
    pub async fn start_resource(
        &self,
        name: &ResourceName,
    ) -> Result<ObservedState, ReconcileError> {
        self.client
            .start(name)
            .await
            .map_err(|e| ReconcileError::remote(name, RemoteCall::Start, e))?;

        debug!("Start requested");

        self.settle(name, LifecycleStatus::InService, self.config.start_timeout)
            .await?
            .ok_or_else(|| ReconcileError::not_found(name))
    }

    /// Send restart-class changes and wait for the instance to settle back to
    /// `Stopped`.
    async fn apply_update(
        &self,
        stopped: &StoppedInstance,
        request: &UpdateRequest,
    ) -> Result<ObservedState, ReconcileError> {
        let name = &stopped.state.name;

        self.client
            .update(name, request)
            .await
            .map_err(|e| ReconcileError::remote(name, RemoteCall::Update, e))?;

        debug!(
            role_arn = request.role_arn.is_some(),
            instance_type = request.instance_type.as_deref().unwrap_or("-"),
            "Update requested"
        );

        self.settle(name, LifecycleStatus::Stopped, self.config.update_timeout)
            .await?
            .ok_or_else(|| ReconcileError::not_found(name))
    }

    /// Wait for `expected`, failing fast if the instance lands in `Failed`.
    ///
    /// Returns `None` if the instance disappeared.
    async fn settle(
        &self,
        name: &ResourceName,
        expected: LifecycleStatus,
        timeout: Duration,
    ) -> Result<Option<ObservedState>, ReconcileError> {
        let target = WaitTarget::statuses([expected, LifecycleStatus::Failed]);

        match self.poller.wait_for(name, &target, timeout).await? {
            WaitOutcome::Reached(state) if state.status == expected => Ok(Some(state)),
            WaitOutcome::Reached(state) => Err(ReconcileError::UnexpectedStatus {
                name: name.clone(),
                expected,
                actual: state.status,
                failure_reason: state.failure_reason,
            }),
            WaitOutcome::Absent => Ok(None),
        }
    }
}
