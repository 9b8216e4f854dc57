//! `CollectionsQuery` — read-only lookup against the message store.
//! Folds in what would otherwise be a separate `Read` message: a query
//! filtered to a single `recordId` is this crate's equivalent of a
//! point read.

use serde::{Deserialize, Serialize};

use crate::auth::{Authorization, AuthorizationBuilder, Signer};
use crate::endpoint::{Message, Reply};
use crate::provider::{MessageStore, Provider};
use crate::records::{RecordsFilter, Write};
use crate::store::{Cursor, Query as StoreQuery};
use crate::{Descriptor, Interface, Method, Result};

/// `CollectionsQuery` descriptor.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDescriptor {
    /// Base descriptor fields.
    #[serde(flatten)]
    pub base: Descriptor,

    /// The filter records must match.
    pub filter: RecordsFilter,
}

/// `CollectionsQuery` message.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    /// The query descriptor.
    pub descriptor: QueryDescriptor,

    /// Authorization, absent for an anonymous query (restricted to
    /// published records).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization: Option<Authorization>,
}

/// Reply to a successful [`Query`].
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryReply {
    /// Matching records, as their current tip versions.
    pub entries: Vec<Write>,

    /// Pagination cursor, if more results remain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
}

#[async_trait::async_trait]
impl Message for Query {
    type Reply = QueryReply;

    fn cid(&self) -> Result<String> {
        crate::cid::from_value(self)
    }

    fn descriptor(&self) -> &Descriptor {
        &self.descriptor.base
    }

    fn authorization(&self) -> Option<&Authorization> {
        self.authorization.as_ref()
    }

    async fn handle(self, owner: &str, provider: &impl Provider) -> Result<Reply<QueryReply>> {
        let author = self.authorization.as_ref().map(Authorization::author).transpose()?;

        let mut filter = self.descriptor.filter;
        if author.as_deref() != Some(owner) {
            filter.published = Some(true);
        }

        let (entries, cursor) = MessageStore::query(provider, owner, &StoreQuery::new(filter)).await?;
        let writes: Vec<Write> = entries.into_iter().filter_map(|e| e.as_write().cloned()).collect();

        Ok(Reply::with_body(200, QueryReply { entries: writes, cursor: Some(cursor) }))
    }
}

/// Builds a [`Query`] message.
#[derive(Clone, Debug, Default)]
pub struct QueryBuilder {
    filter: RecordsFilter,
}

impl QueryBuilder {
    /// Start a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the filter records must match.
    #[must_use]
    pub fn filter(mut self, filter: RecordsFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Sign and assemble an authenticated query.
    ///
    /// # Errors
    /// Returns an error if signing fails.
    pub async fn build(self, signer: &impl Signer) -> Result<Query> {
        let descriptor = QueryDescriptor {
            base: Descriptor { interface: Interface::Records, method: Method::Query },
            filter: self.filter,
        };
        let descriptor_cid = crate::cid::from_value(&descriptor)?;
        let authorization = AuthorizationBuilder::new(descriptor_cid).build(signer).await?;
        Ok(Query { descriptor, authorization: Some(authorization) })
    }

    /// Build an anonymous query, restricted by the handler to published
    /// records.
    #[must_use]
    pub fn build_anonymous(self) -> Query {
        let descriptor = QueryDescriptor {
            base: Descriptor { interface: Interface::Records, method: Method::Query },
            filter: self.filter,
        };
        Query { descriptor, authorization: None }
    }
}
