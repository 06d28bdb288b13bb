//! Control-plane client interface.
//!
//! Each method is a single request/response with no retry. Mutating calls
//! only start an asynchronous transition; completion is observed through
//! [`ResourceClient::describe`].

use async_trait::async_trait;
use nbr_id::ResourceName;
use serde::{Deserialize, Serialize};

use crate::config::DesiredConfig;
use crate::error::ClientError;
use crate::observed::ObservedState;

/// Fields sent with an update call.
///
/// Only restart-class fields are ever carried here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
}

/// Remote control plane for notebook instances.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Begin provisioning. The returned name is usable for polling at once.
    async fn create(&self, desired: &DesiredConfig) -> Result<ResourceName, ClientError>;

    /// Fetch a fresh snapshot.
    async fn describe(&self, name: &ResourceName) -> Result<ObservedState, ClientError>;

    /// Apply restart-class changes. Only legal while stopped.
    async fn update(&self, name: &ResourceName, request: &UpdateRequest)
        -> Result<(), ClientError>;

    async fn start(&self, name: &ResourceName) -> Result<(), ClientError>;

    async fn stop(&self, name: &ResourceName) -> Result<(), ClientError>;

    async fn delete(&self, name: &ResourceName) -> Result<(), ClientError>;
}
