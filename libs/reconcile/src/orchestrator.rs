//! Lifecycle entrypoints.
//!
//! The orchestrator is what callers drive: create, read, update and delete,
//! plus the declarative `plan`/`apply` pair. It combines the reconciler with
//! tag synchronisation, reads back a fresh [`ResourceRecord`] after every
//! mutation, and wraps failures in a [`LifecycleError`] carrying the
//! instance name and the operation.

use std::sync::Arc;

use nbr_id::{OperationId, ResourceName};
use tracing::{info, instrument, warn};

use crate::config::{ConfigDiff, DesiredConfig, FieldClass};
use crate::error::{LifecycleError, Operation, ReconcileError, RemoteCall};
use crate::observed::{ReadOutcome, ResourceRecord};
use crate::plan::Plan;
use crate::reconciler::{Reconciler, UpdatePath};
use crate::tags::{strip_reserved, sync_tags, TagClient};

/// What `apply` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Created,
    Unchanged,
    Updated { restarted: bool },
    Replaced,
}

impl Applied {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Unchanged => "unchanged",
            Self::Updated { .. } => "updated",
            Self::Replaced => "replaced",
        }
    }
}

/// Result of `apply`.
#[derive(Debug, Clone)]
pub struct ApplyReport {
    pub applied: Applied,
    pub record: ResourceRecord,
}

pub struct LifecycleOrchestrator {
    reconciler: Reconciler,
    tags: Arc<dyn TagClient>,
}

impl LifecycleOrchestrator {
    pub fn new(reconciler: Reconciler, tags: Arc<dyn TagClient>) -> Self {
        Self { reconciler, tags }
    }

    /// Create the instance and return its state once provisioning settled
    /// or the create wait gave up.
    #[instrument(skip(self, desired), fields(name = %desired.name, operation_id = %OperationId::new()))]
    pub async fn create(&self, desired: &DesiredConfig) -> Result<ResourceRecord, LifecycleError> {
        self.do_create(desired)
            .await
            .map_err(|e| LifecycleError::new(&desired.name, Operation::Create, e))
    }

    /// Refresh the instance. A missing instance is [`ReadOutcome::Gone`],
    /// not an error.
    #[instrument(skip(self), fields(name = %name, operation_id = %OperationId::new()))]
    pub async fn read(&self, name: &ResourceName) -> Result<ReadOutcome, LifecycleError> {
        self.do_read(name)
            .await
            .map_err(|e| LifecycleError::new(name, Operation::Read, e))
    }

    /// Converge an existing instance to `desired`.
    ///
    /// The live state is the baseline. Tags are synchronised first; a tag
    /// failure aborts before the instance is stopped.
    #[instrument(skip(self, desired), fields(name = %desired.name, operation_id = %OperationId::new()))]
    pub async fn update(&self, desired: &DesiredConfig) -> Result<ResourceRecord, LifecycleError> {
        self.do_update(desired)
            .await
            .map(|(record, _)| record)
            .map_err(|e| LifecycleError::new(&desired.name, Operation::Update, e))
    }

    /// Delete the instance and wait until it is gone. Deleting a missing
    /// instance succeeds.
    #[instrument(skip(self), fields(name = %name, operation_id = %OperationId::new()))]
    pub async fn delete(&self, name: &ResourceName) -> Result<(), LifecycleError> {
        self.reconciler
            .delete_resource(name)
            .await
            .map_err(|e| LifecycleError::new(name, Operation::Delete, e))
    }

    /// Refresh and diff without mutating anything.
    #[instrument(skip(self, desired), fields(name = %desired.name, operation_id = %OperationId::new()))]
    pub async fn plan(&self, desired: &DesiredConfig) -> Result<Plan, LifecycleError> {
        self.do_plan(desired)
            .await
            .map_err(|e| LifecycleError::new(&desired.name, Operation::Plan, e))
    }

    /// Refresh, plan and execute.
    #[instrument(skip(self, desired), fields(name = %desired.name, operation_id = %OperationId::new()))]
    pub async fn apply(&self, desired: &DesiredConfig) -> Result<ApplyReport, LifecycleError> {
        self.do_apply(desired)
            .await
            .map_err(|e| LifecycleError::new(&desired.name, Operation::Apply, e))
    }

    async fn do_create(&self, desired: &DesiredConfig) -> Result<ResourceRecord, ReconcileError> {
        let name = self.reconciler.create_resource(desired).await?;
        self.read_existing(&name).await
    }

    async fn do_read(&self, name: &ResourceName) -> Result<ReadOutcome, ReconcileError> {
        let Some(observed) = self.reconciler.describe(name).await? else {
            info!("Notebook instance does not exist");
            return Ok(ReadOutcome::Gone);
        };

        let tags = match self.tags.list_tags(&observed.arn).await {
            Ok(tags) => strip_reserved(tags),
            // Deleted between the two calls.
            Err(e) if e.is_not_found() => return Ok(ReadOutcome::Gone),
            Err(e) => {
                return Err(ReconcileError::Tags {
                    name: name.clone(),
                    call: RemoteCall::ListTags,
                    source: e,
                })
            }
        };

        Ok(ReadOutcome::Found(ResourceRecord { observed, tags }))
    }

    async fn read_existing(&self, name: &ResourceName) -> Result<ResourceRecord, ReconcileError> {
        self.do_read(name)
            .await?
            .found()
            .ok_or_else(|| ReconcileError::not_found(name))
    }

    async fn do_update(
        &self,
        desired: &DesiredConfig,
    ) -> Result<(ResourceRecord, UpdatePath), ReconcileError> {
        let name = &desired.name;
        let current = self.read_existing(name).await?;
        self.converge(&current, desired).await
    }

    /// Tag sync followed by the restart-class update, then a fresh read.
    async fn converge(
        &self,
        current: &ResourceRecord,
        desired: &DesiredConfig,
    ) -> Result<(ResourceRecord, UpdatePath), ReconcileError> {
        let name = &desired.name;
        let baseline = current.current_config();
        let diff = ConfigDiff::between(&baseline, desired);

        let force_new = diff.fields_of(FieldClass::ForceNew);
        if !force_new.is_empty() {
            return Err(ReconcileError::RequiresReplacement {
                name: name.clone(),
                fields: force_new,
            });
        }

        if diff.is_empty() {
            info!("Notebook instance already up to date");
            return Ok((current.clone(), UpdatePath::Noop));
        }

        let tag_diff = sync_tags(
            self.tags.as_ref(),
            &current.observed.arn,
            &current.tags,
            &desired.tags,
        )
        .await
        .map_err(|(call, source)| ReconcileError::Tags {
            name: name.clone(),
            call,
            source,
        })?;

        if !tag_diff.is_empty() {
            info!(
                set = tag_diff.to_set.len(),
                removed = tag_diff.to_remove.len(),
                "Tags synchronised"
            );
        }

        let path = self
            .reconciler
            .update_resource(name, &baseline, desired)
            .await?;

        let record = self.read_existing(name).await?;
        Ok((record, path))
    }

    async fn do_plan(&self, desired: &DesiredConfig) -> Result<Plan, ReconcileError> {
        let current = self.do_read(&desired.name).await?.found();
        Ok(Plan::compute(desired, current))
    }

    async fn do_apply(&self, desired: &DesiredConfig) -> Result<ApplyReport, ReconcileError> {
        let plan = self.do_plan(desired).await?;
        info!(plan = %plan, "Applying plan");

        let report = match plan {
            Plan::Create => ApplyReport {
                applied: Applied::Created,
                record: self.do_create(desired).await?,
            },
            Plan::Noop(record) => ApplyReport {
                applied: Applied::Unchanged,
                record: *record,
            },
            Plan::Update { current, .. } => {
                let (record, path) = self.converge(&current, desired).await?;
                let restarted = matches!(path, UpdatePath::Applied { restarted: true });
                ApplyReport {
                    applied: Applied::Updated { restarted },
                    record,
                }
            }
            Plan::Replace { current, fields } => {
                warn!(
                    fields = ?fields,
                    status = %current.status(),
                    "Replacing notebook instance"
                );
                self.reconciler.delete_resource(&desired.name).await?;
                ApplyReport {
                    applied: Applied::Replaced,
                    record: self.do_create(desired).await?,
                }
            }
        };

        info!(applied = report.applied.as_str(), "Plan applied");
        Ok(report)
    }
}
