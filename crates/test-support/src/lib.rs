//! Test fixtures for `dwn-core`: deterministic Ed25519 keyrings and a
//! preloaded DID document registry, standing in for the DID resolution
//! and signing collaborators a real deployment would plug in.

use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use dwn_core::auth::{Document, Signer, VerificationMethod};
use dwn_core::store::memory::MemoryStore;
use ed25519_dalek::{Signer as _, SigningKey};
use rand::rngs::OsRng;

/// Alice's test DID.
pub const ALICE_DID: &str = "did:key:alice";
/// Bob's test DID.
pub const BOB_DID: &str = "did:key:bob";

/// A signing keyring for a single test identity.
pub struct Keyring {
    did: String,
    signing_key: SigningKey,
}

impl Keyring {
    /// Generate a new keyring for `did`.
    #[must_use]
    pub fn new(did: impl Into<String>) -> Self {
        Self { did: did.into(), signing_key: SigningKey::generate(&mut OsRng) }
    }

    /// This keyring's DID, without the `#fragment`.
    #[must_use]
    pub fn did(&self) -> &str {
        &self.did
    }

    /// This keyring's DID document, suitable for
    /// [`MemoryStore::register_did`].
    #[must_use]
    pub fn document(&self) -> Document {
        Document {
            verification_method: vec![VerificationMethod {
                id: self.verification_method(),
                public_key_multibase: Base64UrlUnpadded::encode_string(
                    self.signing_key.verifying_key().as_bytes(),
                ),
            }],
        }
    }
}

#[async_trait]
impl Signer for Keyring {
    async fn try_sign(&self, payload: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(self.signing_key.sign(payload).to_bytes().to_vec())
    }

    async fn public_key(&self) -> anyhow::Result<Vec<u8>> {
        Ok(self.signing_key.verifying_key().as_bytes().to_vec())
    }

    fn verification_method(&self) -> String {
        format!("{}#key-1", self.did)
    }
}

/// A [`MemoryStore`] preloaded with each of `keyrings`' DID documents.
#[must_use]
pub fn provider(keyrings: &[&Keyring]) -> MemoryStore {
    let store = MemoryStore::new();
    for keyring in keyrings {
        store.register_did(keyring.did(), keyring.document());
    }
    store
}
