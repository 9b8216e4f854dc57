//! # DWN Core
//!
//! Core of a Decentralized Web Node: the `CollectionsWrite` message
//! pipeline and the protocol-based authorization engine that decides
//! whether an inbound write is accepted.
//!
//! Out of scope, treated as external collaborators: DID resolution, JWS
//! signing/verification primitives, the underlying block store and
//! inverted index, CLI/HTTP front-ends, bundling, logging, and JSON
//! schema compilation. This crate names them only by their interface
//! contracts (see [`provider`]).

pub mod auth;
pub mod cid;
pub mod endpoint;
pub mod protocols;
pub mod provider;
pub mod range;
pub mod records;
pub mod store;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use crate::endpoint::{Message, Reply, Status, handle_message};
pub use crate::range::{DateRange, Lower, Range, Upper};

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while validating, authorizing, or committing a
/// message. Detail strings match the substrings tests assert on.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The message failed schema, immutability, or deterministic-ID
    /// validation. 400.
    #[error("{0}")]
    BadRequest(String),

    /// The message failed signature verification or protocol
    /// authorization. 401.
    #[error("{0}")]
    Forbidden(String),

    /// The message lost the conflict-resolution comparison against the
    /// current tip. 409.
    #[error("{0}")]
    Conflict(String),

    /// No matching record/definition was found. 404.
    #[error("{0}")]
    NotFound(String),

    /// Collaborator (store I/O, DID resolution, serialization) failure.
    /// Propagates as-is per spec.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Other(e.into())
    }
}

impl From<base64ct::Error> for Error {
    fn from(e: base64ct::Error) -> Self {
        Self::Other(anyhow::anyhow!("base64 decode error: {e}"))
    }
}

/// Shorthand for building a [`Error::Forbidden`] with a formatted detail.
#[macro_export]
macro_rules! forbidden {
    ($($arg:tt)*) => {
        $crate::Error::Forbidden(format!($($arg)*))
    };
}

/// Shorthand for building an [`Error::Other`] wrapping an ad hoc message.
/// Used for conditions that indicate a bug or an upstream invariant
/// violation rather than a rejected message.
#[macro_export]
macro_rules! unexpected {
    ($($arg:tt)*) => {
        $crate::Error::Other(anyhow::anyhow!($($arg)*))
    };
}

/// Top-level DWN interface a message belongs to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Interface {
    /// Record lifecycle messages (`CollectionsWrite`, `CollectionsQuery`).
    #[default]
    Records,

    /// Protocol definition messages (`ProtocolsConfigure`).
    Protocols,
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Records => write!(f, "Records"),
            Self::Protocols => write!(f, "Protocols"),
        }
    }
}

/// Method discriminant carried by every message descriptor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub enum Method {
    /// `CollectionsWrite` — create or update a record.
    #[default]
    Write,

    /// `CollectionsQuery` — query the message store.
    Query,

    /// `ProtocolsConfigure` — install a protocol definition.
    Configure,
}

/// Fields common to every message descriptor.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    /// The interface the message belongs to.
    pub interface: Interface,

    /// The method the message invokes.
    pub method: Method,
}

/// Either a single value or a list of values — used by filters that may
/// match one or more equivalent values (e.g. author, recipient).
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    /// A single value.
    One(T),
    /// More than one value, matched as a disjunction.
    Many(Vec<T>),
}

impl<T: Clone> OneOrMany<T> {
    /// Flatten to a `Vec`.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        match self {
            Self::One(v) => vec![v.clone()],
            Self::Many(v) => v.clone(),
        }
    }
}
