//! # Message Store (C3)
//!
//! An append-ish, content-addressed store with an inverted tag index.
//! [`index`] implements the index; [`block`] implements canonical
//! block encode/decode; [`memory`] is the in-memory reference
//! [`crate::provider::MessageStore`]/[`crate::provider::BlockStore`]
//! used by this crate's own tests.

pub mod block;
pub mod index;
pub mod memory;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::protocols::Configure;
use crate::records::{RecordsFilter, Write};
use crate::{Descriptor, Message, Result};

/// A stored message plus its indexed tags.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Entry {
    /// The underlying message.
    pub message: EntryType,

    /// Tags this entry is indexed by (see `spec.md` §4.3): `recordId`,
    /// `contextId`, `protocol`, `schema`, `parentId`, `dataFormat`,
    /// `recipient`, `author`, `isLatestTip`.
    #[serde(default)]
    pub indexes: BTreeMap<String, String>,
}

/// Tagged union of the message kinds the store persists.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "entryType")]
pub enum EntryType {
    /// A `CollectionsWrite` message.
    Write(Write),
    /// A `ProtocolsConfigure` message.
    Configure(Configure),
}

impl Entry {
    /// Wrap a [`Write`] as a store entry, computing its index tags.
    #[must_use]
    pub fn from_write(write: Write) -> Self {
        let indexes = write.indexes();
        Self {
            message: EntryType::Write(write),
            indexes,
        }
    }

    /// Wrap a [`Configure`] as a store entry, computing its index tags.
    #[must_use]
    pub fn from_configure(configure: Configure) -> Self {
        let indexes = configure.indexes();
        Self {
            message: EntryType::Configure(configure),
            indexes,
        }
    }

    /// The entry's message CID.
    pub fn cid(&self) -> Result<String> {
        match &self.message {
            EntryType::Write(w) => w.cid(),
            EntryType::Configure(c) => c.cid(),
        }
    }

    /// The entry's descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &Descriptor {
        match &self.message {
            EntryType::Write(w) => w.descriptor(),
            EntryType::Configure(c) => c.descriptor(),
        }
    }

    /// Borrow the entry as a [`Write`], if it is one.
    #[must_use]
    pub fn as_write(&self) -> Option<&Write> {
        match &self.message {
            EntryType::Write(w) => Some(w),
            EntryType::Configure(_) => None,
        }
    }

    /// Borrow the entry as a [`Configure`], if it is one.
    #[must_use]
    pub fn as_configure(&self) -> Option<&Configure> {
        match &self.message {
            EntryType::Configure(c) => Some(c),
            EntryType::Write(_) => None,
        }
    }
}

/// A query over the message store: entries matching *any* of `filters`
/// (each filter itself is a conjunction of field equalities).
#[derive(Clone, Debug, Default)]
pub struct Query {
    /// Alternative filters, OR'd together.
    pub filters: Vec<RecordsFilter>,

    /// When set, only entries with `isLatestTip=true` are returned.
    pub latest_tip_only: bool,
}

impl Query {
    /// A query for every entry matching `filter` that is the live tip
    /// of its record.
    #[must_use]
    pub fn new(filter: RecordsFilter) -> Self {
        Self {
            filters: vec![filter],
            latest_tip_only: true,
        }
    }

    /// A query including archived (non-tip) lineage entries — used to
    /// fetch a full lineage or a specific historical write.
    #[must_use]
    pub fn including_archived(filter: RecordsFilter) -> Self {
        Self {
            filters: vec![filter],
            latest_tip_only: false,
        }
    }
}

/// Pagination cursor returned by a query; opaque to callers.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Cursor {
    /// Opaque continuation token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_cid: Option<String>,
}
