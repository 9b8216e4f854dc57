//! # Endpoint
//!
//! The uniform entry point for every message type: verify the
//! authorization JWS against a resolved DID, then dispatch into the
//! message's own handler.

use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::auth::Authorization;
use crate::provider::Provider;
use crate::{Descriptor, Result};

/// Verify `message`'s authorization (if any) and hand it to its handler.
///
/// # Errors
/// Returns a [`crate::Error::Forbidden`] if signature verification fails,
/// or whatever error the message's own `handle` returns.
pub async fn handle_message<T>(
    owner: &str, message: impl Message<Reply = T>, provider: &impl Provider,
) -> Result<Reply<T>> {
    if let Some(authorization) = message.authorization() {
        authorization.verify(provider).await?;
    }
    message.handle(owner, provider).await
}

/// Methods common to every message type this crate handles.
#[async_trait]
pub trait Message: Serialize + Clone + Debug + Send + Sync {
    /// The message's endpoint-specific reply body.
    type Reply: Serialize + Send + Sync;

    /// Compute the message's CID.
    ///
    /// # Errors
    /// Returns an error if the message cannot be canonically encoded.
    fn cid(&self) -> Result<String>;

    /// The component of the message descriptor common to all messages.
    fn descriptor(&self) -> &Descriptor;

    /// The message's authorization, if set.
    fn authorization(&self) -> Option<&Authorization>;

    /// Validate and commit the message, producing its reply.
    async fn handle(self, owner: &str, provider: &impl Provider) -> Result<Reply<Self::Reply>>;
}

/// Reply envelope returned by every endpoint.
#[derive(Debug, Default, Deserialize, Serialize)]
#[allow(clippy::module_name_repetitions)]
pub struct Reply<T> {
    /// Status accompanying the reply.
    pub status: Status,

    /// Endpoint-specific reply body.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(flatten)]
    pub body: Option<T>,
}

impl<T> Reply<T> {
    /// A reply with no body, just a status.
    #[must_use]
    pub fn status(code: u16) -> Self {
        Self {
            status: Status { code, detail: None },
            body: None,
        }
    }

    /// A reply carrying a body.
    #[must_use]
    pub fn with_body(code: u16, body: T) -> Self {
        Self {
            status: Status { code, detail: None },
            body: Some(body),
        }
    }
}

/// Reply status.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    /// Status code.
    pub code: u16,

    /// Status detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
