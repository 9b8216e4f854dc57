//! Protocol-based authorization (C6).
//!
//! Decides whether an inbound `CollectionsWrite` is permitted under the
//! protocol it names, by resolving the write's position in the
//! protocol's structural tree (via the schema of each ancestor in its
//! `parentId` chain) and evaluating the `allow` rule attached to that
//! position. Grounded on the ancestor-chain-walking shape of the
//! teacher's protocol authorization (structural chain lookup, rule
//! evaluation over an actor/action match), simplified to the
//! `anyone`/`recipient` rule DSL this crate implements.

use crate::forbidden;
use crate::protocols::configure::{Action, ProtocolDefinition};
use crate::provider::{MessageStore, Provider};
use crate::records::{RecordsFilter, Write};
use crate::store::Query;
use crate::Result;

/// Walk `write`'s structural ancestors (via `parentId`), oldest first.
/// Each ancestor is resolved to its current tip. A `parentId` that
/// cannot be resolved to a stored record is a protocol-chain integrity
/// failure, not a missing-optional-field case.
pub async fn record_chain(
    owner: &str, parent_id: Option<&str>, provider: &impl Provider,
) -> Result<Vec<Write>> {
    let mut chain = Vec::new();
    let mut current = parent_id.map(ToString::to_string);

    while let Some(id) = current {
        let filter = RecordsFilter::new().record_id(id);
        let (entries, _) = MessageStore::query(provider, owner, &Query::new(filter)).await?;
        let write = entries
            .into_iter()
            .find_map(|e| e.as_write().cloned())
            .ok_or_else(|| forbidden!("no parent found"))?;

        current = write.descriptor.parent_id.clone();
        chain.push(write);
    }

    chain.reverse();
    Ok(chain)
}

/// Fetch the installed [`ProtocolDefinition`] for `protocol`.
async fn protocol_definition(
    owner: &str, protocol: &str, provider: &impl Provider,
) -> Result<ProtocolDefinition> {
    let filter = RecordsFilter::new().protocol(protocol.to_string());
    let (entries, _) = MessageStore::query(provider, owner, &Query::new(filter)).await?;

    entries
        .into_iter()
        .find_map(|e| e.as_configure().map(|c| c.descriptor.definition.clone()))
        .ok_or_else(|| forbidden!("unable to find protocol definition"))
}

/// Authorize `write` against its named protocol's structural tree and
/// `allow` rules. `chain` is `write`'s structural ancestors (oldest
/// first, as returned by [`record_chain`]), not including `write`
/// itself.
///
/// # Errors
/// Returns [`crate::Error::Forbidden`] with the detail matching the
/// specific authorization failure (missing protocol definition, schema
/// not recognised by the protocol, no matching structure level, no
/// matching `allow` rule).
pub async fn permit_write(owner: &str, write: &Write, chain: &[Write], provider: &impl Provider) -> Result<()> {
    let Some(protocol) = &write.descriptor.protocol else {
        return Ok(());
    };
    let definition = protocol_definition(owner, protocol, provider).await?;

    let mut path = Vec::with_capacity(chain.len() + 1);
    for ancestor in chain {
        let schema = ancestor.descriptor.schema.as_deref().unwrap_or_default();
        path.push(definition.label_for_schema(schema)?);
    }
    let own_schema = write.descriptor.schema.as_deref().unwrap_or_default();
    path.push(definition.label_for_schema(own_schema)?);

    let record_def =
        definition.record_at(&path).ok_or_else(|| forbidden!("not allowed in structure level"))?;

    let allow = record_def.allow.as_ref().ok_or_else(|| forbidden!("no allow rule defined for requester"))?;

    let author = write.authorization.author()?;

    if let Some(anyone) = &allow.anyone {
        if anyone.to.contains(&Action::Write) {
            return Ok(());
        }
    }

    if let Some(recipient_rule) = &allow.recipient {
        let of_path: Vec<&str> = recipient_rule.of.split('/').filter(|s| !s.is_empty()).collect();
        if of_path.len() > chain.len() {
            return Err(forbidden!(
                "path to expected recipient is longer than actual length of ancestor message chain"
            ));
        }

        let ancestor = if of_path.is_empty() { chain.last() } else { chain.get(of_path.len() - 1) };

        if let Some(ancestor) = ancestor {
            let ancestor_schema = ancestor.descriptor.schema.as_deref().unwrap_or_default();
            let ancestor_label = definition.label_for_schema(ancestor_schema)?;
            if let Some(&expected_label) = of_path.last() {
                if ancestor_label != expected_label {
                    return Err(forbidden!("mismatching record schema"));
                }
            }

            if ancestor.descriptor.recipient.as_deref() == Some(author.as_str())
                && recipient_rule.to.contains(&Action::Write)
            {
                return Ok(());
            }

            return Err(forbidden!("unexpected inbound message author"));
        }
    }

    Err(forbidden!("no allow rule defined for requester"))
}
