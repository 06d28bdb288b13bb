//! Lifecycle status model.
//!
//! The control plane reports status as a string. Parsing is strict: an empty
//! or unknown value is an error, never a silent "absent". Absence only comes
//! from a not-found lookup and is modelled as its own variant.

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

/// Lifecycle status of a notebook instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleStatus {
    Pending,
    InService,
    Stopping,
    Stopped,
    Updating,
    Deleting,
    Failed,
    /// Lookup returned not-found. Never appears on the wire.
    Absent,
}

/// Error parsing a wire status value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StatusParseError {
    #[error("status field is empty")]
    Empty,

    #[error("unknown lifecycle status {0:?}")]
    Unknown(String),
}

impl LifecycleStatus {
    /// Parse a status value as reported by the control plane.
    pub fn from_wire(s: &str) -> Result<Self, StatusParseError> {
        match s {
            "" => Err(StatusParseError::Empty),
            "Pending" => Ok(Self::Pending),
            "InService" => Ok(Self::InService),
            "Stopping" => Ok(Self::Stopping),
            "Stopped" => Ok(Self::Stopped),
            "Updating" => Ok(Self::Updating),
            "Deleting" => Ok(Self::Deleting),
            "Failed" => Ok(Self::Failed),
            other => Err(StatusParseError::Unknown(other.to_string())),
        }
    }

    /// The wire value, or `None` for [`LifecycleStatus::Absent`].
    pub fn wire_value(&self) -> Option<&'static str> {
        match self {
            Self::Pending => Some("Pending"),
            Self::InService => Some("InService"),
            Self::Stopping => Some("Stopping"),
            Self::Stopped => Some("Stopped"),
            Self::Updating => Some("Updating"),
            Self::Deleting => Some("Deleting"),
            Self::Failed => Some("Failed"),
            Self::Absent => None,
        }
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_value().unwrap_or("Absent"))
    }
}

/// Serde adapter for status fields in control-plane payloads.
pub mod wire {
    use serde::{de, Deserialize, Deserializer, Serializer};

    use super::LifecycleStatus;

    pub fn serialize<S>(status: &LifecycleStatus, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match status.wire_value() {
            Some(value) => serializer.serialize_str(value),
            None => Err(serde::ser::Error::custom(
                "absent is not a wire status value",
            )),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<LifecycleStatus, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        LifecycleStatus::from_wire(&s).map_err(de::Error::custom)
    }
}

/// What a status wait is waiting for.
///
/// An empty status set means "wait until the resource is gone".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitTarget {
    /// Any of the listed statuses.
    AnyOf(BTreeSet<LifecycleStatus>),

    /// Describe reporting not-found.
    Absent,
}

impl WaitTarget {
    /// Build a target from a set of accepted statuses.
    pub fn statuses(statuses: impl IntoIterator<Item = LifecycleStatus>) -> Self {
        let set: BTreeSet<_> = statuses
            .into_iter()
            .filter(|s| *s != LifecycleStatus::Absent)
            .collect();
        if set.is_empty() {
            Self::Absent
        } else {
            Self::AnyOf(set)
        }
    }

    /// Wait for a single status.
    pub fn status(status: LifecycleStatus) -> Self {
        Self::statuses([status])
    }

    /// Returns true if an observed status satisfies the target.
    pub fn accepts(&self, status: LifecycleStatus) -> bool {
        match self {
            Self::AnyOf(set) => set.contains(&status),
            Self::Absent => false,
        }
    }

    /// Returns true if the wait succeeds only on not-found.
    pub fn waits_for_absence(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl fmt::Display for WaitTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("Absent"),
            Self::AnyOf(set) => {
                let parts: Vec<_> = set.iter().map(ToString::to_string).collect();
                f.write_str(&parts.join("|"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_roundtrip() {
        for status in [
            LifecycleStatus::Pending,
            LifecycleStatus::InService,
            LifecycleStatus::Stopping,
            LifecycleStatus::Stopped,
            LifecycleStatus::Updating,
            LifecycleStatus::Deleting,
            LifecycleStatus::Failed,
        ] {
            let wire = status.wire_value().unwrap();
            assert_eq!(LifecycleStatus::from_wire(wire), Ok(status));
        }
    }

    #[test]
    fn test_empty_status_is_not_absent() {
        assert_eq!(
            LifecycleStatus::from_wire(""),
            Err(StatusParseError::Empty)
        );
        assert!(LifecycleStatus::from_wire("Absent").is_err());
        assert_eq!(LifecycleStatus::Absent.wire_value(), None);
    }

    #[test]
    fn test_unknown_status_rejected() {
        assert_eq!(
            LifecycleStatus::from_wire("inservice"),
            Err(StatusParseError::Unknown("inservice".to_string()))
        );
    }

    #[test]
    fn test_empty_target_waits_for_absence() {
        let target = WaitTarget::statuses([]);
        assert!(target.waits_for_absence());
        assert!(!target.accepts(LifecycleStatus::Stopped));
        assert_eq!(target.to_string(), "Absent");
    }

    #[test]
    fn test_target_display_and_accepts() {
        let target = WaitTarget::statuses([LifecycleStatus::InService, LifecycleStatus::Failed]);
        assert!(target.accepts(LifecycleStatus::Failed));
        assert!(!target.accepts(LifecycleStatus::Pending));
        assert_eq!(target.to_string(), "InService|Failed");
    }
}
