//! # Records
//!
//! Filter model used both to query the message store (C3) and, via
//! [`RecordsFilter::is_match`]-style field comparisons inside
//! [`crate::store::index`], to back the indexed-tag lookups the write
//! pipeline and queries depend on.

mod query;
mod write;

use std::collections::BTreeMap;
use std::fmt::Display;

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use self::query::{Query, QueryBuilder, QueryDescriptor, QueryReply};
pub use self::write::{derive_context_id, entry_id, Write, WriteBuilder, WriteData, WriteDescriptor};
use crate::{DateRange, Lower, OneOrMany, Range, Upper};

/// Records filter: a conjunction of field-equality/range constraints
/// used to query the message store.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsFilter {
    /// Get a single object by its ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,

    /// Records matching the specified author(s).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<OneOrMany<String>>,

    /// Records matching the specified recipient(s).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<OneOrMany<String>>,

    /// Records with the specified context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,

    /// The CID of the structural protocol-ancestor record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// Entry matching the specified protocol.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    /// Records with the specified schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// The MIME type of the requested data, e.g. `application/json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_format: Option<String>,

    /// Match records with the specified tags.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, TagFilter>>,

    /// CID of the data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_cid: Option<String>,

    /// Whether the record is published.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,

    /// Filter messages published within the specified range.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_published: Option<DateRange>,

    /// Filter messages created within the specified range.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_created: Option<DateRange>,
}

/// A single field's filter value, as resolved against the index.
#[derive(Clone, Debug)]
pub enum FilterVal {
    /// Filter on an exact value.
    Equal(String),

    /// Filter on one or more values (disjunction).
    OneOf(Vec<String>),

    /// Filter on a (string-comparable) range.
    Range(Range<String>),
}

impl RecordsFilter {
    /// Every indexed field this filter constrains, as `(field, value)`
    /// pairs to be ANDed together by the index.
    #[allow(clippy::too_many_lines)]
    #[must_use]
    pub fn indexed_fields(&self) -> Vec<(String, FilterVal)> {
        let mut fields = Vec::new();

        if let Some(record_id) = &self.record_id {
            fields.push(("recordId".to_string(), FilterVal::Equal(record_id.clone())));
        }
        if let Some(parent_id) = &self.parent_id {
            fields.push(("parentId".to_string(), FilterVal::Equal(parent_id.clone())));
        }
        if let Some(recipient) = &self.recipient {
            fields.push(("recipient".to_string(), FilterVal::OneOf(recipient.to_vec())));
        }
        if let Some(context_id) = &self.context_id {
            fields.push(("contextId".to_string(), FilterVal::Equal(context_id.clone())));
        }
        if let Some(schema) = &self.schema {
            fields.push(("schema".to_string(), FilterVal::Equal(schema.clone())));
        }
        if let Some(protocol) = &self.protocol {
            fields.push(("protocol".to_string(), FilterVal::Equal(protocol.clone())));
        }
        if let Some(data_cid) = &self.data_cid {
            fields.push(("dataCid".to_string(), FilterVal::Equal(data_cid.clone())));
        }
        if let Some(date_published) = &self.date_published {
            fields.push(("datePublished".to_string(), FilterVal::Range(to_string_range(date_published))));
        }
        if let Some(date_created) = &self.date_created {
            fields.push(("dateCreated".to_string(), FilterVal::Range(to_string_range(date_created))));
        }
        if let Some(data_format) = &self.data_format {
            fields.push(("dataFormat".to_string(), FilterVal::Equal(data_format.clone())));
        }
        if let Some(published) = self.published {
            fields.push(("published".to_string(), FilterVal::Equal(published.to_string())));
        }
        if let Some(author) = &self.author {
            fields.push(("author".to_string(), FilterVal::OneOf(author.to_vec())));
        }
        if let Some(tags) = &self.tags {
            for (key, filter) in tags {
                let tag_key = format!("tag.{key}");
                match filter {
                    TagFilter::Equal(value) => {
                        fields.push((tag_key, FilterVal::Equal(value.to_string())));
                    }
                    TagFilter::Range(range) => {
                        let lower = range.lower.as_ref().map(|lower| match lower {
                            Lower::Inclusive(val) => Lower::Inclusive(format!("{val:0>10}")),
                            Lower::Exclusive(val) => Lower::Exclusive(format!("{val:0>10}")),
                        });
                        let upper = range.upper.as_ref().map(|upper| match upper {
                            Upper::Inclusive(val) => Upper::Inclusive(format!("{val:0>10}")),
                            Upper::Exclusive(val) => Upper::Exclusive(format!("{val:0>10}")),
                        });
                        fields.push((tag_key, FilterVal::Range(Range { lower, upper })));
                    }
                    TagFilter::StartsWith(value) => {
                        fields.push((tag_key, FilterVal::Equal(value.to_string())));
                    }
                }
            }
        }

        fields
    }
}

fn to_string_range(range: &DateRange) -> Range<String> {
    let lower = range.lower.as_ref().map(|lower| match lower {
        Lower::Inclusive(v) => Lower::Inclusive(v.to_rfc3339_opts(SecondsFormat::Micros, true)),
        Lower::Exclusive(v) => Lower::Exclusive(v.to_rfc3339_opts(SecondsFormat::Micros, true)),
    });
    let upper = range.upper.as_ref().map(|upper| match upper {
        Upper::Inclusive(v) => Upper::Inclusive(v.to_rfc3339_opts(SecondsFormat::Micros, true)),
        Upper::Exclusive(v) => Upper::Exclusive(v.to_rfc3339_opts(SecondsFormat::Micros, true)),
    });
    Range { lower, upper }
}

/// Sort order for a records query.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Sort {
    /// Sort `dateCreated` oldest to newest.
    #[serde(rename = "createdAscending")]
    CreatedAsc,
    /// Sort `dateCreated` newest to oldest.
    #[serde(rename = "createdDescending")]
    CreatedDesc,
    /// Sort `dateModified` oldest to newest.
    #[serde(rename = "modifiedAscending")]
    #[default]
    ModifiedAsc,
    /// Sort `dateModified` newest to oldest.
    #[serde(rename = "modifiedDescending")]
    ModifiedDesc,
}

impl Display for Sort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CreatedAsc | Self::CreatedDesc => write!(f, "dateCreated"),
            Self::ModifiedAsc | Self::ModifiedDesc => write!(f, "dateModified"),
        }
    }
}

/// Tag filter.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TagFilter {
    /// Match tags starting with a string value.
    StartsWith(String),
    /// Filter tags by numeric range.
    Range(Range<usize>),
    /// Filter by an exact value.
    Equal(Value),
}

impl Default for TagFilter {
    fn default() -> Self {
        Self::Equal(Value::Null)
    }
}

impl RecordsFilter {
    /// A new, empty filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by record ID.
    #[must_use]
    pub fn record_id(mut self, record_id: impl Into<String>) -> Self {
        self.record_id = Some(record_id.into());
        self
    }

    /// Filter by protocol.
    #[must_use]
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    /// Filter by schema.
    #[must_use]
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Filter by context ID.
    #[must_use]
    pub fn context_id(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = Some(context_id.into());
        self
    }

    /// Filter by parent ID.
    #[must_use]
    pub fn parent_id(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Filter by published flag.
    #[must_use]
    pub const fn published(mut self, published: bool) -> Self {
        self.published = Some(published);
        self
    }
}
