//! # Provider (C3 — Message Store contract)
//!
//! The store and its block/index backing are named by `spec.md` §1 as
//! external collaborators ("the underlying block store and inverted
//! index"); this module defines the contracts a concrete store must
//! satisfy. [`crate::store`] ships the in-memory reference
//! implementation used by this crate's own tests.

use async_trait::async_trait;

use crate::auth::DidResolver;
use crate::store::{Cursor, Entry, Query};
use crate::Result;

/// Composes every collaborator a write/query handler needs.
pub trait Provider: MessageStore + BlockStore + DidResolver + Clone {}

/// Append-ish, content-addressed message store with a tag index.
/// Implementations are tenanted by `owner` (the DWN "target").
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Store `entry`, indexing it by the tags [`Entry::indexes`] returns.
    async fn put(&self, owner: &str, entry: &Entry) -> Result<()>;

    /// Query the store for entries matching any of `query`'s filters.
    async fn query(&self, owner: &str, query: &Query) -> Result<(Vec<Entry>, Cursor)>;

    /// Fetch a single entry by message CID.
    async fn get(&self, owner: &str, message_cid: &str) -> Result<Option<Entry>>;

    /// Delete the entry associated with `message_cid`.
    async fn delete(&self, owner: &str, message_cid: &str) -> Result<()>;

    /// Remove every entry for every owner. Test/reset use only.
    async fn purge(&self) -> Result<()>;
}

/// Content-addressed block storage backing the message store.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Store `block` keyed by `cid`.
    async fn put(&self, owner: &str, cid: &str, block: &[u8]) -> Result<()>;

    /// Fetch the block keyed by `cid`, if present.
    async fn get(&self, owner: &str, cid: &str) -> Result<Option<Vec<u8>>>;

    /// Delete the block keyed by `cid`.
    async fn delete(&self, owner: &str, cid: &str) -> Result<()>;

    /// Remove every block for every owner. Test/reset use only.
    async fn purge(&self) -> Result<()>;
}
