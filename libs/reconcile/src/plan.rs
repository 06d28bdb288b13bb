//! Convergence planning.
//!
//! A plan is a pure decision over the desired configuration and the live
//! record; it never calls the control plane.

use std::fmt;

use crate::config::{ConfigDiff, DesiredConfig, Field, FieldClass};
use crate::observed::ResourceRecord;

/// What `apply` would do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// The instance does not exist.
    Create,

    /// The live configuration already matches.
    Noop(Box<ResourceRecord>),

    /// Converge in place: tags and restart-class fields only.
    Update {
        current: Box<ResourceRecord>,
        diff: ConfigDiff,
    },

    /// A force-new field changed: delete and create again.
    Replace {
        current: Box<ResourceRecord>,
        fields: Vec<Field>,
    },
}

impl Plan {
    pub fn compute(desired: &DesiredConfig, current: Option<ResourceRecord>) -> Self {
        let Some(current) = current else {
            return Self::Create;
        };

        let diff = ConfigDiff::between(&current.current_config(), desired);
        if diff.is_empty() {
            return Self::Noop(Box::new(current));
        }

        if diff.requires_replacement() {
            return Self::Replace {
                current: Box::new(current),
                fields: diff.fields_of(FieldClass::ForceNew),
            };
        }

        Self::Update {
            current: Box::new(current),
            diff,
        }
    }

    /// Short action name.
    pub fn action(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Noop(_) => "noop",
            Self::Update { .. } => "update",
            Self::Replace { .. } => "replace",
        }
    }

    /// True if applying this plan stops the instance.
    pub fn interrupts_service(&self) -> bool {
        match self {
            Self::Create | Self::Noop(_) => false,
            Self::Update { diff, .. } => diff.requires_restart(),
            Self::Replace { .. } => true,
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => f.write_str("create"),
            Self::Noop(_) => f.write_str("no changes"),
            Self::Update { diff, .. } => write!(f, "update ({diff})"),
            Self::Replace { fields, .. } => {
                let names: Vec<_> = fields.iter().map(Field::as_str).collect();
                write!(f, "replace ({})", names.join(", "))
            }
        }
    }
}
