//! Canonical block encode/decode used by the index and message store.
//! A thin wrapper over [`crate::cid`]'s CBOR encoding so the store
//! layer only ever talks in bytes and CIDs, never in serde directly.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{Result, unexpected};

/// CBOR-encode `value` into a byte block suitable for content-addressed
/// storage.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(|e| unexpected!("failed to encode block: {e}"))?;
    Ok(buf)
}

/// Decode a byte block previously produced by [`encode`].
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::from_reader(bytes).map_err(|e| unexpected!("failed to decode block: {e}"))
}

/// Compute the CID a block of `value` would be stored under.
pub fn compute_cid<T: Serialize>(value: &T) -> Result<String> {
    crate::cid::from_value(value)
}
