//! `CollectionsWrite` (C4), lineage resolution (C5), and the write
//! handler orchestrating them (C7).

use std::collections::BTreeMap;

use base64ct::Encoding;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{Authorization, AuthorizationBuilder, Signer};
use crate::endpoint::{Message, Reply};
use crate::protocols::{self, authorize};
use crate::provider::{MessageStore, Provider};
use crate::records::RecordsFilter;
use crate::store::{Entry, Query};
use crate::{forbidden, unexpected, Descriptor, Interface, Method, Result};

/// Fields a `CollectionsWrite` may not change across versions of the
/// same record. Checked against the record's initial write whenever an
/// update (a write carrying `lineageParent`) is processed.
const IMMUTABLE_FIELDS: &[&str] = &["protocol", "recipient", "schema", "parentId", "dataFormat", "dateCreated"];

/// `CollectionsWrite` descriptor.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteDescriptor {
    /// Base descriptor fields.
    #[serde(flatten)]
    pub base: Descriptor,

    /// The protocol this record belongs to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    /// The structural parent of this record within its protocol, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// The record's schema URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// The intended recipient of this record, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,

    /// The MIME type of `data`.
    pub data_format: String,

    /// Content-address of `data`.
    pub data_cid: String,

    /// Size of `data` in bytes.
    pub data_size: u64,

    /// When the record (its first version) was created. Immutable.
    pub date_created: DateTime<Utc>,

    /// When this version was written. Used for conflict-resolution
    /// ordering; distinct from `dateCreated` and never required to be
    /// monotonic relative to other fields.
    pub date_modified: DateTime<Utc>,

    /// Whether the record is published.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,

    /// When the record was published.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_published: Option<DateTime<Utc>>,
}

/// Input data for a [`WriteBuilder`].
#[derive(Clone, Debug)]
pub enum WriteData {
    /// Raw bytes, stored inline.
    Bytes {
        /// The record's content.
        data: Vec<u8>,
    },
}

/// `CollectionsWrite` message: creates or updates a record.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Write {
    /// The record's permanent, content-derived identifier.
    pub record_id: String,

    /// The record's protocol-scoped context, if it belongs to one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,

    /// The CID of the previous version of this record, absent for the
    /// initial write. Distinct from `descriptor.parentId`, which names
    /// this record's structural ancestor within its protocol, not a
    /// prior version of itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineage_parent: Option<String>,

    /// The write descriptor.
    pub descriptor: WriteDescriptor,

    /// Authorization binding this message to its author.
    pub authorization: Authorization,

    /// The record's data, inlined. Real deployments may instead
    /// reference data already held in the block store; this crate only
    /// models the inline case.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoded_data: Option<String>,
}

/// Compute the deterministic `recordId` for a record's initial write:
/// the CID of its descriptor bound to its author.
///
/// # Errors
/// Returns an error if the descriptor cannot be canonically encoded.
pub fn entry_id(descriptor: &WriteDescriptor, author: &str) -> Result<String> {
    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct EntryIdInput<'a> {
        date_created: DateTime<Utc>,
        schema: Option<String>,
        data_format: &'a str,
        recipient: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        protocol: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        parent_id: Option<String>,
        author: &'a str,
    }
    crate::cid::from_value(&EntryIdInput {
        date_created: descriptor.date_created,
        schema: descriptor.schema.clone(),
        data_format: &descriptor.data_format,
        recipient: descriptor.recipient.clone(),
        protocol: descriptor.protocol.clone(),
        parent_id: descriptor.parent_id.clone(),
        author,
    })
}

/// Compute the deterministic `contextId` for a record, given its
/// `recordId` and its structural parent's `contextId` (`None` for a
/// protocol root record).
#[must_use]
pub fn derive_context_id(record_id: &str, parent_context_id: Option<&str>) -> String {
    parent_context_id.map_or_else(|| record_id.to_string(), |parent| format!("{parent}/{record_id}"))
}

impl Write {
    /// Whether this is the initial write of a record (no prior version).
    #[must_use]
    pub const fn is_initial(&self) -> bool {
        self.lineage_parent.is_none()
    }

    /// Index tags recorded for this entry.
    #[must_use]
    pub fn indexes(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("recordId".to_string(), self.record_id.clone());
        map.insert("interface".to_string(), "Records".to_string());
        map.insert("dataFormat".to_string(), self.descriptor.data_format.clone());
        map.insert("dataCid".to_string(), self.descriptor.data_cid.clone());
        map.insert("dateCreated".to_string(), self.descriptor.date_created.to_rfc3339());
        map.insert("isLatestTip".to_string(), "true".to_string());
        if let Some(context_id) = &self.context_id {
            map.insert("contextId".to_string(), context_id.clone());
        }
        if let Some(parent_id) = &self.descriptor.parent_id {
            map.insert("parentId".to_string(), parent_id.clone());
        }
        if let Some(protocol) = &self.descriptor.protocol {
            map.insert("protocol".to_string(), protocol.clone());
        }
        if let Some(schema) = &self.descriptor.schema {
            map.insert("schema".to_string(), schema.clone());
        }
        if let Some(recipient) = &self.descriptor.recipient {
            map.insert("recipient".to_string(), recipient.clone());
        }
        if let Some(published) = self.descriptor.published {
            map.insert("published".to_string(), published.to_string());
        }
        if let Ok(author) = self.authorization.author() {
            map.insert("author".to_string(), author);
        }
        map
    }

    /// Compare `(dateModified, cid)` against `other`, the ordering used
    /// to resolve conflicting versions of the same record: the later
    /// `dateModified` wins; ties break on the lexicographically larger
    /// CID.
    ///
    /// # Errors
    /// Returns an error if either message's CID cannot be computed.
    pub fn supersedes(&self, other: &Self) -> Result<bool> {
        if self.descriptor.date_modified != other.descriptor.date_modified {
            return Ok(self.descriptor.date_modified > other.descriptor.date_modified);
        }
        Ok(self.cid()? > other.cid()?)
    }

    /// Structural (field-level, store-independent) validation: data
    /// integrity, deterministic ID derivation, and authorization-payload
    /// binding. Lineage- and protocol-dependent checks happen in
    /// [`Message::handle`], which has store access.
    fn validate(&self) -> Result<()> {
        if let Some(encoded) = &self.encoded_data {
            let data = base64ct::Base64UrlUnpadded::decode_vec(encoded)?;
            if data.len() as u64 != self.descriptor.data_size {
                return Err(crate::Error::BadRequest(
                    "actual CID of data and `dataCid` in descriptor mismatch".to_string(),
                ));
            }
            let data_cid = crate::cid::from_value(&data)?;
            if data_cid != self.descriptor.data_cid {
                return Err(crate::Error::BadRequest(
                    "actual CID of data and `dataCid` in descriptor mismatch".to_string(),
                ));
            }
        }

        let author = self.authorization.author()?;

        if self.is_initial() {
            let expected_id = entry_id(&self.descriptor, &author)?;
            if expected_id != self.record_id {
                return Err(crate::Error::BadRequest("does not match deterministic recordId".to_string()));
            }
            if self.descriptor.date_created != self.descriptor.date_modified {
                return Err(crate::Error::BadRequest("must match dateCreated".to_string()));
            }
        }

        let payload = self.authorization.payload()?;
        if payload.descriptor_cid != crate::cid::from_value(&self.descriptor)? {
            return Err(forbidden!("does not match descriptorCid in authorization"));
        }
        if payload.record_id != self.record_id {
            return Err(forbidden!("does not match recordId in authorization"));
        }
        if payload.context_id != self.context_id {
            return Err(forbidden!("does not match contextId in authorization"));
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl Message for Write {
    type Reply = ();

    fn cid(&self) -> Result<String> {
        crate::cid::from_value(self)
    }

    fn descriptor(&self) -> &Descriptor {
        &self.descriptor.base
    }

    fn authorization(&self) -> Option<&Authorization> {
        Some(&self.authorization)
    }

    async fn handle(self, owner: &str, provider: &impl Provider) -> Result<Reply<()>> {
        self.validate()?;

        let author = self.authorization.author()?;
        let existing = fetch_tip(owner, &self.record_id, provider).await?;

        if !self.is_initial() {
            let Some(current_tip) = &existing else {
                return Err(crate::Error::BadRequest("unable to find the lineage root".to_string()));
            };
            let expected = current_tip.cid()?;
            if self.lineage_parent.as_deref() != Some(expected.as_str()) {
                return Err(crate::Error::BadRequest(format!(
                    "expecting lineageParent to be `{}`",
                    self.record_id
                )));
            }
            check_immutable_fields(&self.descriptor, &current_tip.descriptor)?;
        }

        let parent_chain =
            authorize::record_chain(owner, self.descriptor.parent_id.as_deref(), provider).await?;

        if let Some(parent_context_id) = parent_chain.last().and_then(|p| p.context_id.clone()) {
            let expected = derive_context_id(&self.record_id, Some(&parent_context_id));
            if self.context_id.as_deref() != Some(expected.as_str()) {
                return Err(crate::Error::BadRequest("does not match deterministic contextId".to_string()));
            }
        } else if self.descriptor.protocol.is_some() {
            let expected = derive_context_id(&self.record_id, None);
            if self.context_id.as_deref() != Some(expected.as_str()) {
                return Err(crate::Error::BadRequest("does not match deterministic contextId".to_string()));
            }
        }

        if self.descriptor.protocol.is_some() {
            protocols::permit_write(owner, &self, &parent_chain, provider).await?;
        } else if author != owner {
            return Err(forbidden!("unexpected inbound message author"));
        }

        if let Some(current_tip) = &existing {
            if !self.is_initial() && author != current_tip.authorization.author()? {
                return Err(forbidden!("must match to author of lineage parent"));
            }

            if self.cid()? == current_tip.cid()? {
                return Ok(Reply::status(202));
            }
            if !self.supersedes(current_tip)? {
                return Ok(Reply::status(409));
            }
        }

        let entry = Entry::from_write(self);
        MessageStore::put(provider, owner, &entry).await?;

        if let Some(current_tip) = existing {
            let mut superseded = Entry::from_write(current_tip);
            superseded.indexes.insert("isLatestTip".to_string(), "false".to_string());
            MessageStore::put(provider, owner, &superseded).await?;
        }

        Ok(Reply::status(200))
    }
}

async fn fetch_tip(owner: &str, record_id: &str, provider: &impl Provider) -> Result<Option<Write>> {
    let filter = RecordsFilter::new().record_id(record_id);
    let (entries, _) = MessageStore::query(provider, owner, &Query::new(filter)).await?;
    Ok(entries.into_iter().find_map(|e| e.as_write().cloned()))
}

fn check_immutable_fields(incoming: &WriteDescriptor, root: &WriteDescriptor) -> Result<()> {
    if incoming.protocol != root.protocol {
        return Err(crate::Error::BadRequest(immutable_detail("protocol")));
    }
    if incoming.recipient != root.recipient {
        return Err(crate::Error::BadRequest(immutable_detail("recipient")));
    }
    if incoming.schema != root.schema {
        return Err(crate::Error::BadRequest(immutable_detail("schema")));
    }
    if incoming.parent_id != root.parent_id {
        return Err(crate::Error::BadRequest(immutable_detail("parentId")));
    }
    if incoming.data_format != root.data_format {
        return Err(crate::Error::BadRequest(immutable_detail("dataFormat")));
    }
    if incoming.date_created != root.date_created {
        return Err(crate::Error::BadRequest(immutable_detail("dateCreated")));
    }
    Ok(())
}

fn immutable_detail(field: &str) -> String {
    debug_assert!(IMMUTABLE_FIELDS.contains(&field));
    format!("`{field}` is an immutable property")
}

/// Builds a [`Write`] message.
#[derive(Clone, Debug, Default)]
pub struct WriteBuilder {
    protocol: Option<String>,
    parent_id: Option<String>,
    schema: Option<String>,
    recipient: Option<String>,
    data_format: String,
    data: Option<WriteData>,
    published: Option<bool>,
    lineage_parent: Option<String>,
    record_id: Option<String>,
    context_id: Option<String>,
    parent_context_id: Option<String>,
    date_created: Option<DateTime<Utc>>,
    date_modified: Option<DateTime<Utc>>,
}

impl WriteBuilder {
    /// Start a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data_format: "application/json".to_string(),
            ..Self::default()
        }
    }

    /// Set the record's data.
    #[must_use]
    pub fn data(mut self, data: WriteData) -> Self {
        self.data = Some(data);
        self
    }

    /// Set the record's protocol.
    #[must_use]
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    /// Set the record's structural parent by ID, with no protocol
    /// context to derive from (e.g. the parent's full record is
    /// unavailable). Prefer [`Self::protocol_parent`] when the parent
    /// `Write` is on hand, so `contextId` is derived correctly.
    #[must_use]
    pub fn parent_id(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Set the record's structural parent within its protocol, deriving
    /// this record's `contextId` from the parent's.
    #[must_use]
    pub fn protocol_parent(mut self, parent: &Write) -> Self {
        self.parent_id = Some(parent.record_id.clone());
        self.parent_context_id = parent.context_id.clone();
        self
    }

    /// Set the record's schema.
    #[must_use]
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Set the record's recipient.
    #[must_use]
    pub fn recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    /// Set the record's MIME type.
    #[must_use]
    pub fn data_format(mut self, data_format: impl Into<String>) -> Self {
        self.data_format = data_format.into();
        self
    }

    /// Mark the record as published.
    #[must_use]
    pub const fn published(mut self, published: bool) -> Self {
        self.published = Some(published);
        self
    }

    /// Override `dateModified`. Test/fixture use — normally defaults to
    /// the current time.
    #[must_use]
    pub const fn date_modified(mut self, date_modified: DateTime<Utc>) -> Self {
        self.date_modified = Some(date_modified);
        self
    }

    /// Override `dateCreated`. Only meaningful on the initial write;
    /// [`Self::update`] carries the original forward.
    #[must_use]
    pub const fn date_created(mut self, date_created: DateTime<Utc>) -> Self {
        self.date_created = Some(date_created);
        self
    }

    /// Build this message as an update to `parent`, the previous
    /// version of the same record.
    #[must_use]
    pub fn update(mut self, parent: &Write) -> Self {
        self.record_id = Some(parent.record_id.clone());
        self.context_id = parent.context_id.clone();
        self.lineage_parent = Some(parent.cid().unwrap_or_default());
        self.date_created = Some(parent.descriptor.date_created);
        self.protocol = parent.descriptor.protocol.clone();
        self.parent_id = parent.descriptor.parent_id.clone();
        self.schema = parent.descriptor.schema.clone();
        self.recipient = parent.descriptor.recipient.clone();
        self.data_format = parent.descriptor.data_format.clone();
        self
    }

    /// Sign and assemble the message.
    ///
    /// # Errors
    /// Returns an error if the data CID cannot be computed or signing
    /// fails.
    pub async fn build(self, signer: &impl Signer) -> Result<Write> {
        let WriteData::Bytes { data } = self.data.ok_or_else(|| unexpected!("no data provided"))?;
        let data_cid = crate::cid::from_value(&data)?;
        let encoded_data = base64ct::Base64UrlUnpadded::encode_string(&data);

        let now = self.date_modified.unwrap_or_else(Utc::now);
        let date_created = self.date_created.unwrap_or(now);

        let descriptor = WriteDescriptor {
            base: Descriptor {
                interface: Interface::Records,
                method: Method::Write,
            },
            protocol: self.protocol,
            parent_id: self.parent_id,
            schema: self.schema,
            recipient: self.recipient,
            data_format: self.data_format,
            data_cid,
            data_size: data.len() as u64,
            date_created,
            date_modified: now,
            date_published: if self.published == Some(true) { Some(now) } else { None },
            published: self.published,
        };

        let author = signer.verification_method();
        let author_did = author.split('#').next().unwrap_or(&author).to_string();

        let record_id = match self.record_id {
            Some(id) => id,
            None => entry_id(&descriptor, &author_did)?,
        };
        let context_id = self.context_id.or_else(|| {
            descriptor.protocol.as_ref().map(|_| {
                derive_context_id(&record_id, self.parent_context_id.as_deref())
            })
        });

        let mut authorization_builder = AuthorizationBuilder::new(crate::cid::from_value(&descriptor)?)
            .record_id(record_id.clone());
        if let Some(context_id) = &context_id {
            authorization_builder = authorization_builder.context_id(context_id.clone());
        }
        let authorization = authorization_builder.build(signer).await?;

        Ok(Write {
            record_id,
            context_id,
            lineage_parent: self.lineage_parent,
            descriptor,
            authorization,
            encoded_data: Some(encoded_data),
        })
    }
}
