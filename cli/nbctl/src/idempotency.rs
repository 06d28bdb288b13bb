//! Idempotency key helpers.
//!
//! Create requests carry an `Idempotency-Key` derived from the request body
//! and the invocation that sent it. A resent request within one invocation
//! reuses its key; a later invocation, such as a re-create after delete,
//! always gets a fresh one.

use serde::Serialize;
use sha2::{Digest, Sha256};

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

pub fn default_idempotency_key(
    endpoint_name: &str,
    request_scope: &str,
    invocation: &str,
    body: &impl Serialize,
) -> Result<String, serde_json::Error> {
    // Round-trip through Value so map key ordering doesn't affect the key.
    let json_value = serde_json::to_value(body)?;
    let body_json = serde_json::to_vec(&json_value)?;

    let mut hasher = Sha256::new();
    hasher.update(endpoint_name.as_bytes());
    hasher.update(b"\n");
    hasher.update(request_scope.as_bytes());
    hasher.update(b"\n");
    hasher.update(invocation.as_bytes());
    hasher.update(b"\n");
    hasher.update(&body_json);

    Ok(format!("nb_{}", hex::encode(hasher.finalize())))
}
