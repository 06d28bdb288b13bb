//! Observed state snapshots.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use nbr_id::ResourceName;
use serde::{Deserialize, Serialize};

use crate::config::DesiredConfig;
use crate::status::LifecycleStatus;
use crate::tags::Tags;

/// One snapshot of a notebook instance as reported by the control plane.
///
/// Snapshots are never updated; every observation produces a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedState {
    pub name: ResourceName,

    /// Resource-level address.
    pub arn: String,

    #[serde(with = "crate::status::wire")]
    pub status: LifecycleStatus,

    pub role_arn: String,

    pub instance_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,

    #[serde(default)]
    pub security_groups: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_time: Option<DateTime<Utc>>,
}

/// Observed state plus the instance's user tags, as handed to callers for
/// persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub observed: ObservedState,

    #[serde(default)]
    pub tags: Tags,
}

impl ResourceRecord {
    pub fn name(&self) -> &ResourceName {
        &self.observed.name
    }

    pub fn status(&self) -> LifecycleStatus {
        self.observed.status
    }

    /// The live configuration, in the same shape as a desired configuration.
    pub fn current_config(&self) -> DesiredConfig {
        let observed = &self.observed;
        DesiredConfig {
            name: observed.name.clone(),
            role_arn: observed.role_arn.clone(),
            instance_type: observed.instance_type.clone(),
            subnet_id: observed.subnet_id.clone(),
            security_groups: observed.security_groups.clone(),
            kms_key_id: observed.kms_key_id.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// Result of reading a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Found(ResourceRecord),

    /// The resource does not exist; callers clear any persisted identity.
    Gone,
}

impl ReadOutcome {
    pub fn found(self) -> Option<ResourceRecord> {
        match self {
            Self::Found(record) => Some(record),
            Self::Gone => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_describe_payload() {
        let json = serde_json::json!({
            "name": "nb-1",
            "arn": "arn:aws:sagemaker:us-east-1:123456789012:notebook-instance/nb-1",
            "status": "InService",
            "role_arn": "arn:aws:iam::123456789012:role/notebook",
            "instance_type": "ml.t2.medium",
            "security_groups": ["sg-2", "sg-1"],
            "creation_time": "2024-05-01T12:00:00Z"
        });

        let state: ObservedState = serde_json::from_value(json).unwrap();
        assert_eq!(state.status, LifecycleStatus::InService);
        assert_eq!(state.security_groups.len(), 2);
        assert!(state.subnet_id.is_none());
        assert!(state.creation_time.is_some());
    }

    #[test]
    fn test_decode_rejects_empty_status() {
        let json = serde_json::json!({
            "name": "nb-1",
            "arn": "arn",
            "status": "",
            "role_arn": "r",
            "instance_type": "small"
        });
        assert!(serde_json::from_value::<ObservedState>(json).is_err());
    }

    #[test]
    fn test_current_config_includes_tags() {
        let json = serde_json::json!({
            "name": "nb-1",
            "arn": "arn",
            "status": "Stopped",
            "role_arn": "r",
            "instance_type": "small",
            "subnet_id": "subnet-1"
        });
        let mut tags = Tags::new();
        tags.insert("team".into(), "ml".into());
        let record = ResourceRecord {
            observed: serde_json::from_value(json).unwrap(),
            tags,
        };

        let config = record.current_config();
        assert_eq!(config.subnet_id.as_deref(), Some("subnet-1"));
        assert_eq!(config.tags.get("team").map(String::as_str), Some("ml"));
        assert_eq!(record.status(), LifecycleStatus::Stopped);
    }
}
