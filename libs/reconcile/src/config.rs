//! Desired configuration and field-level diffing.
//!
//! Every configurable field belongs to exactly one class:
//!
//! | Field             | Class            |
//! |-------------------|------------------|
//! | `name`            | force-new        |
//! | `subnet_id`       | force-new        |
//! | `security_groups` | force-new        |
//! | `kms_key_id`      | force-new        |
//! | `role_arn`        | requires restart |
//! | `instance_type`   | requires restart |
//! | `tags`            | in place         |

use std::collections::BTreeSet;
use std::fmt;

use nbr_id::ResourceName;
use serde::{Deserialize, Serialize};

use crate::client::UpdateRequest;
use crate::tags::Tags;

/// Caller-supplied target configuration for one notebook instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DesiredConfig {
    pub name: ResourceName,

    /// Execution role the instance assumes.
    pub role_arn: String,

    /// Instance class, e.g. `ml.t2.medium`.
    pub instance_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,

    /// Empty means "let the control plane choose".
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub security_groups: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,

    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
}

impl DesiredConfig {
    pub fn new(
        name: ResourceName,
        role_arn: impl Into<String>,
        instance_type: impl Into<String>,
    ) -> Self {
        Self {
            name,
            role_arn: role_arn.into(),
            instance_type: instance_type.into(),
            subnet_id: None,
            security_groups: BTreeSet::new(),
            kms_key_id: None,
            tags: Tags::new(),
        }
    }

    pub fn with_subnet(mut self, subnet_id: impl Into<String>) -> Self {
        self.subnet_id = Some(subnet_id.into());
        self
    }

    pub fn with_security_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.security_groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_kms_key(mut self, kms_key_id: impl Into<String>) -> Self {
        self.kms_key_id = Some(kms_key_id.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Render one field for display; unset values render as `-`.
    pub fn field_value(&self, field: Field) -> String {
        fn join<'a>(items: impl Iterator<Item = &'a str>) -> String {
            let joined = items.collect::<Vec<_>>().join(",");
            if joined.is_empty() {
                "-".to_string()
            } else {
                joined
            }
        }

        match field {
            Field::Name => self.name.to_string(),
            Field::RoleArn => self.role_arn.clone(),
            Field::InstanceType => self.instance_type.clone(),
            Field::SubnetId => self.subnet_id.clone().unwrap_or_else(|| "-".to_string()),
            Field::SecurityGroups => join(self.security_groups.iter().map(String::as_str)),
            Field::KmsKeyId => self.kms_key_id.clone().unwrap_or_else(|| "-".to_string()),
            Field::Tags => {
                let pairs: Vec<_> = self.tags.iter().map(|(k, v)| format!("{k}={v}")).collect();
                join(pairs.iter().map(String::as_str))
            }
        }
    }
}

/// A configurable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    RoleArn,
    InstanceType,
    SubnetId,
    SecurityGroups,
    KmsKeyId,
    Tags,
}

/// How a change to a field can be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldClass {
    /// Cannot change after creation; the resource must be replaced.
    ForceNew,

    /// Can only change while the resource is stopped.
    RequiresRestart,

    /// Can change at any time without touching the instance.
    InPlace,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::Name,
        Field::RoleArn,
        Field::InstanceType,
        Field::SubnetId,
        Field::SecurityGroups,
        Field::KmsKeyId,
        Field::Tags,
    ];

    pub fn class(&self) -> FieldClass {
        match self {
            Self::Name | Self::SubnetId | Self::SecurityGroups | Self::KmsKeyId => {
                FieldClass::ForceNew
            }
            Self::RoleArn | Self::InstanceType => FieldClass::RequiresRestart,
            Self::Tags => FieldClass::InPlace,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::RoleArn => "role_arn",
            Self::InstanceType => "instance_type",
            Self::SubnetId => "subnet_id",
            Self::SecurityGroups => "security_groups",
            Self::KmsKeyId => "kms_key_id",
            Self::Tags => "tags",
        }
    }

    fn differs(&self, current: &DesiredConfig, desired: &DesiredConfig) -> bool {
        match self {
            Self::Name => current.name != desired.name,
            Self::RoleArn => current.role_arn != desired.role_arn,
            Self::InstanceType => current.instance_type != desired.instance_type,
            Self::SubnetId => current.subnet_id != desired.subnet_id,
            // Optional + computed: an unset desired value never diffs.
            Self::SecurityGroups => {
                !desired.security_groups.is_empty()
                    && current.security_groups != desired.security_groups
            }
            Self::KmsKeyId => current.kms_key_id != desired.kms_key_id,
            Self::Tags => current.tags != desired.tags,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of fields that differ between two configurations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDiff {
    changed: BTreeSet<Field>,
}

impl ConfigDiff {
    /// Compare the current configuration against the desired one.
    pub fn between(current: &DesiredConfig, desired: &DesiredConfig) -> Self {
        let changed = Field::ALL
            .iter()
            .copied()
            .filter(|field| field.differs(current, desired))
            .collect();
        Self { changed }
    }

    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }

    pub fn contains(&self, field: Field) -> bool {
        self.changed.contains(&field)
    }

    /// Changed fields in declaration order.
    pub fn changed(&self) -> impl Iterator<Item = Field> + '_ {
        self.changed.iter().copied()
    }

    /// Changed fields of one class.
    pub fn fields_of(&self, class: FieldClass) -> Vec<Field> {
        self.changed()
            .filter(|field| field.class() == class)
            .collect()
    }

    pub fn requires_replacement(&self) -> bool {
        self.changed().any(|f| f.class() == FieldClass::ForceNew)
    }

    pub fn requires_restart(&self) -> bool {
        self.changed()
            .any(|f| f.class() == FieldClass::RequiresRestart)
    }

    /// Build the update call carrying every changed restart-class field.
    ///
    /// Returns `None` when no restart-class field changed.
    pub fn update_request(&self, desired: &DesiredConfig) -> Option<UpdateRequest> {
        if !self.requires_restart() {
            return None;
        }

        Some(UpdateRequest {
            role_arn: self
                .contains(Field::RoleArn)
                .then(|| desired.role_arn.clone()),
            instance_type: self
                .contains(Field::InstanceType)
                .then(|| desired.instance_type.clone()),
        })
    }
}

impl fmt::Display for ConfigDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.changed.is_empty() {
            return f.write_str("no changes");
        }
        let parts: Vec<_> = self.changed().map(|field| field.as_str()).collect();
        f.write_str(&parts.join(", "))
    }
}
