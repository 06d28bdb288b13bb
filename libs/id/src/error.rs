//! Error types for name validation.

use thiserror::Error;

/// Errors that can occur when validating a resource name.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The input string is empty.
    #[error("name cannot be empty")]
    Empty,

    /// The name is longer than the control plane accepts.
    #[error("name is {len} characters long, at most {max} allowed")]
    TooLong { len: usize, max: usize },

    /// The name contains a character outside `[0-9A-Za-z-]`.
    #[error("invalid character {found:?} at position {position}")]
    InvalidCharacter { found: char, position: usize },

    /// The name starts or ends with a hyphen.
    #[error("name must start and end with an alphanumeric character")]
    HyphenAtEdge,
}
