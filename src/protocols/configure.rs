//! `ProtocolsConfigure` — installs a [`ProtocolDefinition`] in the
//! target's store. Supplemented ambient machinery: `spec.md` §4.6 step 2
//! requires fetching "the `CollectionsWrite` of a `ProtocolsConfigure`"
//! — this message type is what gets fetched.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{Authorization, AuthorizationBuilder, Signer};
use crate::endpoint::{Message, Reply};
use crate::forbidden;
use crate::provider::{MessageStore, Provider};
use crate::records::RecordsFilter;
use crate::store::{Entry, Query};
use crate::{Descriptor, Interface, Method, Result};

/// A protocol-scoped action a rule may grant.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    /// Permission to write (create or update) a record.
    Write,
}

/// `allow.anyone` rule: any author may perform the listed actions.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnyoneRule {
    /// Actions anyone is permitted to perform.
    pub to: Vec<Action>,
}

/// `allow.recipient` rule: the recipient of the ancestor record at
/// `of` (a `/`-separated path of labels) is permitted the listed
/// actions.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientRule {
    /// Slash-separated path of labels identifying the ancestor record
    /// whose recipient is being authorized.
    pub of: String,

    /// Actions the ancestor's recipient is permitted to perform.
    pub to: Vec<Action>,
}

/// The `allow` rule attached to a [`RecordDefinition`].
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Allow {
    /// Anyone-may-write rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anyone: Option<AnyoneRule>,

    /// Recipient-of-ancestor rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<RecipientRule>,
}

/// A single record type's position in the protocol tree.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDefinition {
    /// Who may act on records of this type, and how.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow: Option<Allow>,

    /// Nested record definitions permitted as children of this record.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub records: BTreeMap<String, RecordDefinition>,
}

/// A named protocol's full structural and authorization tree.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolDefinition {
    /// The protocol's URI.
    pub protocol: String,

    /// Label -> schema mapping used to classify an inbound write's
    /// `descriptor.schema` into a structural label.
    #[serde(default)]
    pub labels: BTreeMap<String, LabelDefinition>,

    /// Top-level record definitions (structural roots).
    #[serde(default)]
    pub records: BTreeMap<String, RecordDefinition>,
}

/// A label's schema identifier.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelDefinition {
    /// The schema URI this label matches.
    pub schema: String,
}

impl ProtocolDefinition {
    /// Resolve `descriptor.schema` to its structural label.
    pub fn label_for_schema(&self, schema: &str) -> Result<String> {
        self.labels
            .iter()
            .find(|(_, def)| def.schema == schema)
            .map(|(label, _)| label.clone())
            .ok_or_else(|| crate::forbidden!("record with schema '{schema}' not allowed in protocol"))
    }

    /// Look up the [`RecordDefinition`] for a `/`-separated path of
    /// labels, walking from the protocol's top-level `records`.
    #[must_use]
    pub fn record_at(&self, path: &[String]) -> Option<&RecordDefinition> {
        let mut records = &self.records;
        let mut def = None;
        for label in path {
            let next = records.get(label)?;
            def = Some(next);
            records = &next.records;
        }
        def
    }
}

/// `ProtocolsConfigure` descriptor.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureDescriptor {
    /// Base descriptor fields.
    #[serde(flatten)]
    pub base: Descriptor,

    /// When this configuration was created — used for newest-wins
    /// conflict resolution on re-configuration, mirroring the write
    /// pipeline's `(timestamp, cid)` rule.
    pub message_timestamp: DateTime<Utc>,

    /// The protocol definition being installed.
    pub definition: ProtocolDefinition,
}

/// `ProtocolsConfigure` message.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Configure {
    /// The configure descriptor.
    pub descriptor: ConfigureDescriptor,

    /// Message authorization — the owner's signature.
    pub authorization: Authorization,
}

impl Configure {
    /// Index tags recorded for this entry.
    #[must_use]
    pub fn indexes(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("protocol".to_string(), self.descriptor.definition.protocol.clone());
        map.insert("interface".to_string(), "Protocols".to_string());
        map.insert("isLatestTip".to_string(), "true".to_string());
        if let Ok(author) = self.authorization.author() {
            map.insert("author".to_string(), author);
        }
        map
    }
}

#[async_trait::async_trait]
impl Message for Configure {
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
        let author = self.authorization.author()?;
        if author != owner {
            return Err(forbidden!("only the owner may configure a protocol"));
        }

        let filter = RecordsFilter::new().protocol(self.descriptor.definition.protocol.clone());
        let (existing, _) = MessageStore::query(provider, owner, &Query::new(filter)).await?;
        let current = existing.into_iter().find_map(|e| e.as_configure().cloned());

        if let Some(current) = current {
            let newer = match current.descriptor.message_timestamp.cmp(&self.descriptor.message_timestamp) {
                std::cmp::Ordering::Less => true,
                std::cmp::Ordering::Greater => false,
                std::cmp::Ordering::Equal => current.cid()? < self.cid()?,
            };
            if !newer {
                return Ok(Reply::status(409));
            }
            MessageStore::delete(provider, owner, &current.cid()?).await?;
        }

        let entry = Entry::from_configure(self);
        MessageStore::put(provider, owner, &entry).await?;
        Ok(Reply::status(200))
    }
}

/// Builds a [`Configure`] message.
#[derive(Clone, Debug, Default)]
pub struct ConfigureBuilder {
    definition: ProtocolDefinition,
    message_timestamp: Option<DateTime<Utc>>,
}

impl ConfigureBuilder {
    /// Start a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the protocol definition to install.
    #[must_use]
    pub fn definition(mut self, definition: ProtocolDefinition) -> Self {
        self.definition = definition;
        self
    }

    /// Sign and assemble the message.
    ///
    /// # Errors
    /// Returns an error if signing fails.
    pub async fn build(self, signer: &impl Signer) -> Result<Configure> {
        let descriptor = ConfigureDescriptor {
            base: Descriptor {
                interface: Interface::Protocols,
                method: Method::Configure,
            },
            message_timestamp: self.message_timestamp.unwrap_or_else(Utc::now),
            definition: self.definition,
        };
        let descriptor_cid = crate::cid::from_value(&descriptor)?;
        let authorization = AuthorizationBuilder::new(descriptor_cid).build(signer).await?;

        Ok(Configure {
            descriptor,
            authorization,
        })
    }
}
