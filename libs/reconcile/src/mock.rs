//! In-memory control plane for tests and local development.
//!
//! Mutations put an instance into its intermediate status and queue the
//! statuses it will move through. Each queued transition is applied after a
//! fixed number of describe calls, so pollers observe the intermediate
//! states the way they would against a real, eventually consistent service.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use nbr_id::ResourceName;
use tracing::debug;

use crate::client::{ResourceClient, UpdateRequest};
use crate::config::DesiredConfig;
use crate::error::{ClientError, RemoteCall};
use crate::observed::ObservedState;
use crate::status::LifecycleStatus;
use crate::tags::{TagClient, Tags};

/// Security group assigned when the caller leaves the set empty.
pub const DEFAULT_SECURITY_GROUP: &str = "sg-default";

/// Describe calls per transition by default.
const DEFAULT_STEPS: u32 = 2;

/// A transition script: the first entry is applied immediately, the rest are
/// queued. `None` means the instance is gone.
type Path = Vec<Option<LifecycleStatus>>;

struct MockInstance {
    state: ObservedState,
    tags: Tags,
    upcoming: VecDeque<Option<LifecycleStatus>>,
    countdown: u32,
}

#[derive(Default)]
struct Inner {
    instances: BTreeMap<ResourceName, MockInstance>,
    calls: Vec<RemoteCall>,
    updates: Vec<UpdateRequest>,
    failures: BTreeMap<RemoteCall, VecDeque<ClientError>>,
    paths: BTreeMap<RemoteCall, Path>,
    stalled: bool,
}

/// Scriptable control plane implementing both [`ResourceClient`] and
/// [`TagClient`].
pub struct MockControlPlane {
    inner: Mutex<Inner>,
    steps: u32,
}

impl MockControlPlane {
    pub fn new() -> Self {
        Self::with_steps(DEFAULT_STEPS)
    }

    /// Apply each queued transition after `steps` describe calls.
    pub fn with_steps(steps: u32) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            steps: steps.max(1),
        }
    }

    /// Seed an existing instance.
    pub fn insert(&self, desired: &DesiredConfig, status: LifecycleStatus) {
        let instance = MockInstance {
            state: observed_from(desired, status),
            tags: desired.tags.clone(),
            upcoming: VecDeque::new(),
            countdown: self.steps,
        };
        self.lock().instances.insert(desired.name.clone(), instance);
    }

    /// Fail the next call of the given kind with `error`.
    pub fn fail_next(&self, call: RemoteCall, error: ClientError) {
        self.lock()
            .failures
            .entry(call)
            .or_default()
            .push_back(error);
    }

    /// Replace the transition script for a mutation.
    ///
    /// The first status is applied when the call succeeds, the rest after
    /// successive describe rounds.
    pub fn script(&self, call: RemoteCall, path: impl IntoIterator<Item = Option<LifecycleStatus>>) {
        self.lock().paths.insert(call, path.into_iter().collect());
    }

    /// Stop applying queued transitions: instances stay in their current
    /// intermediate status forever.
    pub fn stall(&self) {
        self.lock().stalled = true;
    }

    pub fn status_of(&self, name: &ResourceName) -> Option<LifecycleStatus> {
        self.lock().instances.get(name).map(|i| i.state.status)
    }

    pub fn tags_of(&self, name: &ResourceName) -> Option<Tags> {
        self.lock().instances.get(name).map(|i| i.tags.clone())
    }

    pub fn instance_type_of(&self, name: &ResourceName) -> Option<String> {
        self.lock()
            .instances
            .get(name)
            .map(|i| i.state.instance_type.clone())
    }

    /// Every call received, in order.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    /// Calls other than describe and list tags.
    pub fn mutations(&self) -> Vec<RemoteCall> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, RemoteCall::Describe | RemoteCall::ListTags))
            .collect()
    }

    /// Update requests received, in order.
    pub fn updates(&self) -> Vec<UpdateRequest> {
        self.lock().updates.clone()
    }

    pub fn count(&self, call: RemoteCall) -> usize {
        self.lock().calls.iter().filter(|c| **c == call).count()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record the call and pop an injected failure, if any.
    fn enter(&self, call: RemoteCall) -> Result<MutexGuard<'_, Inner>, ClientError> {
        let mut inner = self.lock();
        inner.calls.push(call);
        if let Some(err) = inner.failures.get_mut(&call).and_then(VecDeque::pop_front) {
            debug!(call = %call, error = %err, "[MOCK] Injected failure");
            return Err(err);
        }
        Ok(inner)
    }

    /// Validate the current status, then start the call's transition.
    fn mutate(
        &self,
        call: RemoteCall,
        name: &ResourceName,
        allowed: &[LifecycleStatus],
    ) -> Result<(), ClientError> {
        let mut inner = self.enter(call)?;
        let path = inner
            .paths
            .get(&call)
            .cloned()
            .unwrap_or_else(|| default_path(call));

        let instance = inner
            .instances
            .get_mut(name)
            .ok_or_else(|| not_found(name))?;

        let status = instance.state.status;
        if !allowed.contains(&status) {
            return Err(ClientError::api(
                "ValidationException",
                format!("Status ({status}) not in ({allowed:?}). Unable to {call} notebook instance {name}"),
            ));
        }

        debug!(name = %name, call = %call, from = %status, "[MOCK] Transition started");

        let mut path = path.into_iter();
        match path.next() {
            Some(Some(next)) => set_status(&mut instance.state, next),
            Some(None) => {
                inner.instances.remove(name);
                return Ok(());
            }
            None => {}
        }
        instance.upcoming = path.collect();
        instance.countdown = self.steps;
        Ok(())
    }
}

impl Default for MockControlPlane {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceClient for MockControlPlane {
    async fn create(&self, desired: &DesiredConfig) -> Result<ResourceName, ClientError> {
        let mut inner = self.enter(RemoteCall::Create)?;
        if inner.instances.contains_key(&desired.name) {
            return Err(ClientError::api(
                "ResourceInUse",
                format!("Cannot create a duplicate notebook instance ({})", desired.name),
            ));
        }

        let mut path = inner
            .paths
            .get(&RemoteCall::Create)
            .cloned()
            .unwrap_or_else(|| default_path(RemoteCall::Create))
            .into_iter();
        let initial = path.next().flatten().unwrap_or(LifecycleStatus::Pending);

        let mut state = observed_from(desired, initial);
        if state.security_groups.is_empty() {
            state.security_groups.insert(DEFAULT_SECURITY_GROUP.to_string());
        }
        state.creation_time = Some(Utc::now());

        debug!(name = %desired.name, "[MOCK] Creating notebook instance");

        inner.instances.insert(
            desired.name.clone(),
            MockInstance {
                state,
                tags: desired.tags.clone(),
                upcoming: path.collect(),
                countdown: self.steps,
            },
        );
        Ok(desired.name.clone())
    }

    async fn describe(&self, name: &ResourceName) -> Result<ObservedState, ClientError> {
        let mut inner = self.enter(RemoteCall::Describe)?;
        let stalled = inner.stalled;
        let steps = self.steps;

        let instance = inner
            .instances
            .get_mut(name)
            .ok_or_else(|| not_found(name))?;

        if !stalled && !instance.upcoming.is_empty() {
            instance.countdown = instance.countdown.saturating_sub(1);
            if instance.countdown == 0 {
                instance.countdown = steps;
                match instance.upcoming.pop_front().flatten() {
                    Some(next) => set_status(&mut instance.state, next),
                    None => {
                        debug!(name = %name, "[MOCK] Notebook instance gone");
                        inner.instances.remove(name);
                        return Err(not_found(name));
                    }
                }
            }
        }

        Ok(instance.state.clone())
    }

    async fn update(
        &self,
        name: &ResourceName,
        request: &UpdateRequest,
    ) -> Result<(), ClientError> {
        self.mutate(RemoteCall::Update, name, &[LifecycleStatus::Stopped])?;

        let mut inner = self.lock();
        inner.updates.push(request.clone());
        if let Some(instance) = inner.instances.get_mut(name) {
            if let Some(role_arn) = &request.role_arn {
                instance.state.role_arn = role_arn.clone();
            }
            if let Some(instance_type) = &request.instance_type {
                instance.state.instance_type = instance_type.clone();
            }
        }
        Ok(())
    }

    async fn start(&self, name: &ResourceName) -> Result<(), ClientError> {
        self.mutate(RemoteCall::Start, name, &[LifecycleStatus::Stopped])
    }

    async fn stop(&self, name: &ResourceName) -> Result<(), ClientError> {
        self.mutate(
            RemoteCall::Stop,
            name,
            &[LifecycleStatus::InService, LifecycleStatus::Pending],
        )
    }

    async fn delete(&self, name: &ResourceName) -> Result<(), ClientError> {
        self.mutate(
            RemoteCall::Delete,
            name,
            &[LifecycleStatus::Stopped, LifecycleStatus::Failed],
        )
    }
}

#[async_trait]
impl TagClient for MockControlPlane {
    async fn list_tags(&self, arn: &str) -> Result<Tags, ClientError> {
        let inner = self.enter(RemoteCall::ListTags)?;
        find_by_arn(&inner, arn).map(|i| i.tags.clone())
    }

    async fn add_tags(&self, arn: &str, tags: &Tags) -> Result<(), ClientError> {
        let mut inner = self.enter(RemoteCall::AddTags)?;
        let instance = find_by_arn_mut(&mut inner, arn)?;
        instance
            .tags
            .extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    async fn remove_tags(&self, arn: &str, keys: &[String]) -> Result<(), ClientError> {
        let mut inner = self.enter(RemoteCall::RemoveTags)?;
        let instance = find_by_arn_mut(&mut inner, arn)?;
        for key in keys {
            instance.tags.remove(key);
        }
        Ok(())
    }
}

fn default_path(call: RemoteCall) -> Path {
    use LifecycleStatus::*;
    match call {
        RemoteCall::Create | RemoteCall::Start => vec![Some(Pending), Some(InService)],
        RemoteCall::Stop => vec![Some(Stopping), Some(Stopped)],
        RemoteCall::Update => vec![Some(Updating), Some(Stopped)],
        RemoteCall::Delete => vec![Some(Deleting), None],
        _ => Vec::new(),
    }
}

fn arn_for(name: &ResourceName) -> String {
    format!("arn:aws:sagemaker:us-east-1:123456789012:notebook-instance/{name}")
}

fn observed_from(desired: &DesiredConfig, status: LifecycleStatus) -> ObservedState {
    ObservedState {
        name: desired.name.clone(),
        arn: arn_for(&desired.name),
        status,
        role_arn: desired.role_arn.clone(),
        instance_type: desired.instance_type.clone(),
        subnet_id: desired.subnet_id.clone(),
        security_groups: desired.security_groups.clone(),
        kms_key_id: desired.kms_key_id.clone(),
        url: Some(format!("{}.notebook.us-east-1.sagemaker.aws", desired.name)),
        failure_reason: None,
        creation_time: None,
        last_modified_time: None,
    }
}

fn set_status(state: &mut ObservedState, status: LifecycleStatus) {
    state.status = status;
    state.last_modified_time = Some(Utc::now());
    state.failure_reason = (status == LifecycleStatus::Failed)
        .then(|| "mock transition ended in Failed".to_string());
}

fn not_found(name: &ResourceName) -> ClientError {
    ClientError::NotFound(format!("RecordNotFound: notebook instance {name}"))
}

fn find_by_arn<'a>(inner: &'a Inner, arn: &str) -> Result<&'a MockInstance, ClientError> {
    inner
        .instances
        .values()
        .find(|i| i.state.arn == arn)
        .ok_or_else(|| ClientError::NotFound(arn.to_string()))
}

fn find_by_arn_mut<'a>(
    inner: &'a mut Inner,
    arn: &str,
) -> Result<&'a mut MockInstance, ClientError> {
    inner
        .instances
        .values_mut()
        .find(|i| i.state.arn == arn)
        .ok_or_else(|| ClientError::NotFound(arn.to_string()))
}
