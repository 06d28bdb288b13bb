//! Manifest loading.
//!
//! A manifest is a TOML file describing one notebook instance:
//!
//! ```toml
//! name = "nb-1"
//! role_arn = "arn:aws:iam::123456789012:role/notebook"
//! instance_type = "ml.t2.medium"
//! subnet_id = "subnet-0abc"
//! security_groups = ["sg-1", "sg-2"]
//!
//! [tags]
//! team = "research"
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use nbr_reconcile::{DesiredConfig, RESERVED_TAG_PREFIX};

use crate::error::CliError;

pub fn parse_manifest(contents: &str) -> Result<DesiredConfig, CliError> {
    let desired: DesiredConfig =
        toml::from_str(contents).map_err(|e| CliError::Manifest(e.to_string()))?;

    if desired.role_arn.trim().is_empty() {
        return Err(CliError::Manifest("role_arn must not be empty".into()));
    }
    if desired.instance_type.trim().is_empty() {
        return Err(CliError::Manifest("instance_type must not be empty".into()));
    }
    if let Some(key) = desired
        .tags
        .keys()
        .find(|k| k.starts_with(RESERVED_TAG_PREFIX))
    {
        return Err(CliError::Manifest(format!(
            "tag key {key:?} uses the reserved prefix {RESERVED_TAG_PREFIX:?}"
        )));
    }

    Ok(desired)
}

pub fn load_manifest(path: &Path) -> Result<DesiredConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest: {}", path.display()))?;
    parse_manifest(&contents).with_context(|| format!("invalid manifest: {}", path.display()))
}
