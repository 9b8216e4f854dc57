//! # Protocols (C6 — protocol-based authorization)
//!
//! [`configure`] defines the `ProtocolsConfigure` message and the
//! `ProtocolDefinition` DSL it installs. [`authorize`] walks a protocol
//! tree against an inbound `CollectionsWrite`'s lineage to decide
//! whether the write is permitted.

pub mod authorize;
pub mod configure;

pub use self::authorize::permit_write;
pub use self::configure::{
    Action, Allow, AnyoneRule, Configure, ConfigureBuilder, ConfigureDescriptor, LabelDefinition,
    ProtocolDefinition, RecipientRule, RecordDefinition,
};
