//! # Canonical Encoding + CID (Content Identifier)
//!
//! Deterministic CBOR encoding of any serializable value, hashed into a
//! self-describing CID. Every recomputed/compared CID in this crate
//! (`recordId`, `contextId`, message CIDs, lineage parent CIDs) goes
//! through [`from_value`], so equal inputs always yield equal CIDs
//! regardless of call site or platform.

use multihash_codetable::{Code, MultihashDigest};
use serde::Serialize;

use crate::Result;

/// The raw binary codec — this crate has no interest in interpreting
/// CID-addressed bytes as any particular IPLD codec.
const RAW: u64 = 0x55;

/// Compute the CID of a serializable value: canonical CBOR encoding,
/// SHA-256, wrapped as a CIDv1 string.
///
/// Struct field order is fixed by the type's `Serialize` derive, which
/// keeps encoding deterministic across runs for any given type without
/// needing a sorted-map pass at the CBOR layer.
pub fn from_value<T: Serialize>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(|e| crate::unexpected!("failed to encode value as CBOR: {e}"))?;

    let hash = Code::Sha2_256.digest(&buf);
    let cid = cid::Cid::new_v1(RAW, hash);

    Ok(cid.to_string())
}

#[cfg(test)]
mod tests {
    use serde::Serialize;

    use super::*;

    #[derive(Serialize)]
    struct Point {
        x: u32,
        y: u32,
    }

    #[test]
    fn deterministic() {
        let a = from_value(&Point { x: 1, y: 2 }).unwrap();
        let b = from_value(&Point { x: 1, y: 2 }).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn distinguishes_inputs() {
        let a = from_value(&Point { x: 1, y: 2 }).unwrap();
        let b = from_value(&Point { x: 1, y: 3 }).unwrap();
        assert_ne!(a, b);
    }
}
