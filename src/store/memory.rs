//! In-memory reference [`MessageStore`]/[`BlockStore`]/[`DidResolver`].
//!
//! Used as this crate's own test fixture, in place of the teacher's
//! heavier `surrealdb`/`async_nats`-backed provider, which has no
//! in-scope counterpart here (sync/replication and durable storage are
//! both out of scope).

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::auth::{DidResolver, Document};
use crate::provider::{BlockStore, MessageStore, Provider};
use crate::store::index::Index;
use crate::store::{block, Cursor, Entry, Query};
use crate::{unexpected, Result};

/// A cloneable, in-memory provider. Each clone shares the same
/// underlying state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    blocks: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
    indexes: BTreeMap<String, Index>,
    entries: BTreeMap<String, BTreeMap<String, Entry>>,
    documents: BTreeMap<String, Document>,
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a DID document to be returned by [`DidResolver::resolve`]
    /// for `did`. Test fixture convenience — a real `DidResolver` would
    /// reach an actual DID method resolver instead.
    pub fn register_did(&self, did: &str, document: Document) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).documents.insert(did.to_string(), document);
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn put(&self, owner: &str, entry: &Entry) -> Result<()> {
        let message_cid = entry.cid()?;
        let bytes = block::encode(entry)?;

        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.blocks.entry(owner.to_string()).or_default().insert(message_cid.clone(), bytes);
        inner.indexes.entry(owner.to_string()).or_default().insert(&message_cid, &entry.indexes);
        inner.entries.entry(owner.to_string()).or_default().insert(message_cid, entry.clone());
        Ok(())
    }

    async fn query(&self, owner: &str, query: &Query) -> Result<(Vec<Entry>, Cursor)> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let Some(index) = inner.indexes.get(owner) else {
            return Ok((Vec::new(), Cursor::default()));
        };

        let matches = index.matching_query(query);
        let entries_by_cid = inner.entries.get(owner);
        let mut entries: Vec<Entry> =
            matches.iter().filter_map(|cid| entries_by_cid.and_then(|m| m.get(cid)).cloned()).collect();
        entries.sort_by_key(|e| e.cid().unwrap_or_default());

        Ok((entries, Cursor::default()))
    }

    async fn get(&self, owner: &str, message_cid: &str) -> Result<Option<Entry>> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner.entries.get(owner).and_then(|m| m.get(message_cid)).cloned())
    }

    async fn delete(&self, owner: &str, message_cid: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let removed = inner.entries.get_mut(owner).and_then(|m| m.remove(message_cid));
        if let Some(entry) = removed {
            if let Some(index) = inner.indexes.get_mut(owner) {
                index.remove(message_cid, &entry.indexes);
            }
        }
        if let Some(blocks) = inner.blocks.get_mut(owner) {
            blocks.remove(message_cid);
        }
        Ok(())
    }

    async fn purge(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.blocks.clear();
        inner.indexes.clear();
        inner.entries.clear();
        Ok(())
    }
}

#[async_trait]
impl BlockStore for MemoryStore {
    async fn put(&self, owner: &str, cid: &str, block: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.blocks.entry(owner.to_string()).or_default().insert(cid.to_string(), block.to_vec());
        Ok(())
    }

    async fn get(&self, owner: &str, cid: &str) -> Result<Option<Vec<u8>>> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner.blocks.get(owner).and_then(|m| m.get(cid)).cloned())
    }

    async fn delete(&self, owner: &str, cid: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(blocks) = inner.blocks.get_mut(owner) {
            blocks.remove(cid);
        }
        Ok(())
    }

    async fn purge(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.blocks.clear();
        Ok(())
    }
}

#[async_trait]
impl DidResolver for MemoryStore {
    async fn resolve(&self, did_url: &str) -> Result<Document> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .documents
            .get(did_url)
            .cloned()
            .ok_or_else(|| unexpected!("no document registered for `{did_url}`"))
    }
}

impl Provider for MemoryStore {}
