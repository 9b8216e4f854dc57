//! In-memory inverted tag index backing [`crate::store::memory`].
//!
//! Each tag value maps to the set of message CIDs carrying it. A query
//! intersects the CID sets of every field its filter constrains (an
//! AND-conjunction, per [`crate::records::RecordsFilter::indexed_fields`]),
//! then unions the result across the query's alternative filters.

use std::collections::{BTreeMap, BTreeSet};

use crate::records::FilterVal;
use crate::store::Query;

/// A per-owner inverted index: `field -> value -> {message_cid}`.
#[derive(Debug, Default)]
pub struct Index {
    fields: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
}

impl Index {
    /// An empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index `message_cid` under every `(field, value)` pair in `tags`.
    pub fn insert(&mut self, message_cid: &str, tags: &BTreeMap<String, String>) {
        for (field, value) in tags {
            self.fields
                .entry(field.clone())
                .or_default()
                .entry(value.clone())
                .or_default()
                .insert(message_cid.to_string());
        }
    }

    /// Remove `message_cid` from every entry named by `tags`.
    pub fn remove(&mut self, message_cid: &str, tags: &BTreeMap<String, String>) {
        for (field, value) in tags {
            if let Some(set) = self.fields.get_mut(field).and_then(|values| values.get_mut(value)) {
                set.remove(message_cid);
            }
        }
    }

    fn matching(&self, field: &str, filter: &FilterVal) -> BTreeSet<String> {
        let Some(values) = self.fields.get(field) else {
            return BTreeSet::new();
        };
        match filter {
            FilterVal::Equal(v) => values.get(v).cloned().unwrap_or_default(),
            FilterVal::OneOf(vs) => {
                vs.iter().filter_map(|v| values.get(v)).flatten().cloned().collect()
            }
            FilterVal::Range(range) => values
                .iter()
                .filter(|(k, _)| range.contains(k))
                .flat_map(|(_, set)| set.iter().cloned())
                .collect(),
        }
    }

    /// Message CIDs matching every `(field, value)` constraint in
    /// `fields`; every indexed CID if `fields` is empty.
    fn matching_all(&self, fields: &[(String, FilterVal)]) -> BTreeSet<String> {
        let Some((first, rest)) = fields.split_first() else {
            return self.fields.values().flat_map(BTreeMap::values).flatten().cloned().collect();
        };
        let mut result = self.matching(&first.0, &first.1);
        for (field, filter) in rest {
            let next = self.matching(field, filter);
            result.retain(|cid| next.contains(cid));
        }
        result
    }

    /// Message CIDs matching `query`: the union, across its alternative
    /// filters, of each filter's AND-conjuncted field matches, narrowed
    /// to `isLatestTip=true` entries when `query.latest_tip_only`.
    #[must_use]
    pub fn matching_query(&self, query: &Query) -> BTreeSet<String> {
        let mut result = BTreeSet::new();
        for filter in &query.filters {
            result.extend(self.matching_all(&filter.indexed_fields()));
        }
        if query.latest_tip_only {
            let tips = self.matching("isLatestTip", &FilterVal::Equal("true".to_string()));
            result.retain(|cid| tips.contains(cid));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
    }

    #[test]
    fn and_conjunction_across_fields() {
        let mut index = Index::new();
        index.insert("cid-1", &tags(&[("protocol", "p1"), ("schema", "note")]));
        index.insert("cid-2", &tags(&[("protocol", "p1"), ("schema", "comment")]));

        let fields = vec![
            ("protocol".to_string(), FilterVal::Equal("p1".to_string())),
            ("schema".to_string(), FilterVal::Equal("note".to_string())),
        ];
        let matches = index.matching_all(&fields);
        assert_eq!(matches.len(), 1);
        assert!(matches.contains("cid-1"));
    }

    #[test]
    fn remove_drops_from_every_field() {
        let mut index = Index::new();
        let tags = tags(&[("protocol", "p1")]);
        index.insert("cid-1", &tags);
        index.remove("cid-1", &tags);

        let matches = index.matching_all(&[("protocol".to_string(), FilterVal::Equal("p1".to_string()))]);
        assert!(matches.is_empty());
    }
}
