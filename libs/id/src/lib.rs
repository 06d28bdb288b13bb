//! # nbr-id
//!
//! Identity types for the notebook reconciler.
//!
//! ## Design Principles
//!
//! - A notebook instance is identified by its user-chosen name; the name is
//!   fixed at creation and used for every subsequent lookup
//! - Names have one canonical string form with strict parsing
//! - Operation IDs are system-generated and only used for correlation
//!
//! ## Formats
//!
//! Resource names: 1-63 ASCII alphanumerics or hyphens, starting and ending
//! with an alphanumeric character (`nb-1`, `research-gpu-02`).
//!
//! Operation IDs use a prefixed ULID: `op_01HV4Z2WQXKJNM8GPQY6VBKC3D`.

mod error;
mod types;

pub use error::IdError;
pub use types::*;
