//! Tag synchronisation.
//!
//! Tags are the only in-place mutable part of a notebook instance. They are
//! synchronised before any restart-class change so a tag failure aborts the
//! update while the instance is still untouched.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{ClientError, RemoteCall};

/// User tags, sorted by key.
pub type Tags = BTreeMap<String, String>;

/// Keys with this prefix are owned by the control plane.
pub const RESERVED_TAG_PREFIX: &str = "aws:";

/// Tag API of the control plane, keyed by resource ARN.
#[async_trait]
pub trait TagClient: Send + Sync {
    async fn list_tags(&self, arn: &str) -> Result<Tags, ClientError>;

    async fn add_tags(&self, arn: &str, tags: &Tags) -> Result<(), ClientError>;

    async fn remove_tags(&self, arn: &str, keys: &[String]) -> Result<(), ClientError>;
}

/// Difference between two tag sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDiff {
    /// New or changed tags.
    pub to_set: Tags,

    /// Keys no longer present.
    pub to_remove: Vec<String>,
}

impl TagDiff {
    pub fn is_empty(&self) -> bool {
        self.to_set.is_empty() && self.to_remove.is_empty()
    }
}

/// Compute the calls needed to turn `old` into `new`.
///
/// Reserved keys are ignored on both sides.
pub fn diff_tags(old: &Tags, new: &Tags) -> TagDiff {
    let to_remove = old
        .keys()
        .filter(|k| !is_reserved(k) && !new.contains_key(*k))
        .cloned()
        .collect();

    let to_set = new
        .iter()
        .filter(|(k, v)| !is_reserved(k) && old.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    TagDiff { to_set, to_remove }
}

/// Drop control-plane owned tags.
pub fn strip_reserved(tags: Tags) -> Tags {
    tags.into_iter().filter(|(k, _)| !is_reserved(k)).collect()
}

fn is_reserved(key: &str) -> bool {
    key.starts_with(RESERVED_TAG_PREFIX)
}

/// Apply a tag diff: removals first, then additions.
///
/// On failure the returned call identifies which request failed.
pub async fn sync_tags(
    client: &dyn TagClient,
    arn: &str,
    old: &Tags,
    new: &Tags,
) -> Result<TagDiff, (RemoteCall, ClientError)> {
    let diff = diff_tags(old, new);

    if !diff.to_remove.is_empty() {
        debug!(arn, keys = ?diff.to_remove, "Removing tags");
        client
            .remove_tags(arn, &diff.to_remove)
            .await
            .map_err(|e| (RemoteCall::RemoveTags, e))?;
    }

    if !diff.to_set.is_empty() {
        debug!(arn, count = diff.to_set.len(), "Setting tags");
        client
            .add_tags(arn, &diff.to_set)
            .await
            .map_err(|e| (RemoteCall::AddTags, e))?;
    }

    Ok(diff)
}
