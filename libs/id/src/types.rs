//! Identity types.

use std::fmt;
use std::str::FromStr;

use ulid::Ulid;

use crate::IdError;

// =============================================================================
// Resource names
// =============================================================================

/// Maximum length of a notebook instance name.
pub const MAX_NAME_LEN: usize = 63;

/// Name of a notebook instance.
///
/// The name is the resource's stable identity: it is chosen by the caller,
/// assigned at creation and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceName(String);

impl ResourceName {
    /// Parses and validates a resource name.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if s.is_empty() {
            return Err(IdError::Empty);
        }

        let len = s.chars().count();
        if len > MAX_NAME_LEN {
            return Err(IdError::TooLong {
                len,
                max: MAX_NAME_LEN,
            });
        }

        for (position, c) in s.chars().enumerate() {
            if !(c.is_ascii_alphanumeric() || c == '-') {
                return Err(IdError::InvalidCharacter { found: c, position });
            }
        }

        if s.starts_with('-') || s.ends_with('-') {
            return Err(IdError::HyphenAtEdge);
        }

        Ok(Self(s.to_string()))
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ResourceName {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for ResourceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for ResourceName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for ResourceName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Operations
// =============================================================================

/// Correlation ID for one lifecycle operation, rendered as `op_{ulid}`.
///
/// Generated fresh for every orchestrator call and attached to its log span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationId(Ulid);

impl OperationId {
    pub const PREFIX: &'static str = "op";

    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", Self::PREFIX, self.0)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_name_valid() {
        for name in ["nb-1", "a", "Research-GPU-02", "x--y", "0abc"] {
            assert!(ResourceName::parse(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn test_name_empty() {
        assert_eq!(ResourceName::parse(""), Err(IdError::Empty));
    }

    #[test]
    fn test_name_hyphen_at_edge() {
        assert_eq!(ResourceName::parse("-nb"), Err(IdError::HyphenAtEdge));
        assert_eq!(ResourceName::parse("nb-"), Err(IdError::HyphenAtEdge));
    }

    #[test]
    fn test_name_invalid_character() {
        let err = ResourceName::parse("nb_1").unwrap_err();
        assert_eq!(
            err,
            IdError::InvalidCharacter {
                found: '_',
                position: 2
            }
        );
    }

    #[test]
    fn test_name_too_long() {
        let name = "a".repeat(MAX_NAME_LEN + 1);
        assert!(matches!(
            ResourceName::parse(&name),
            Err(IdError::TooLong { len: 64, max: 63 })
        ));
        assert!(ResourceName::parse(&"a".repeat(MAX_NAME_LEN)).is_ok());
    }

    #[test]
    fn test_name_json_rejects_invalid() {
        let result: Result<ResourceName, _> = serde_json::from_str("\"bad name\"");
        assert!(result.is_err());

        let name: ResourceName = serde_json::from_str("\"nb-1\"").unwrap();
        assert_eq!(name.as_str(), "nb-1");
    }

    #[test]
    fn test_operation_id_format() {
        let id = OperationId::new().to_string();
        let (prefix, ulid) = id.split_once('_').unwrap();
        assert_eq!(prefix, OperationId::PREFIX);
        assert_eq!(ulid.len(), 26);
        assert!(ulid.parse::<Ulid>().is_ok());
    }

    #[test]
    fn test_operation_ids_are_unique() {
        assert_ne!(OperationId::new(), OperationId::new());
    }

    proptest! {
        #[test]
        fn prop_generated_names_parse(name in "[0-9A-Za-z]([0-9A-Za-z-]{0,61}[0-9A-Za-z])?") {
            let parsed = ResourceName::parse(&name).unwrap();
            prop_assert_eq!(parsed.as_str(), name.as_str());
        }

        #[test]
        fn prop_names_with_forbidden_chars_rejected(
            prefix in "[a-z]{1,10}",
            bad in "[_./: ]",
            suffix in "[a-z]{1,10}",
        ) {
            let name = format!("{prefix}{bad}{suffix}");
            prop_assert!(ResourceName::parse(&name).is_err());
        }
    }
}
