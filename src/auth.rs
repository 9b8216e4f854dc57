//! # Authorization (C2 — JWS Signer/Verifier)
//!
//! A message's `authorization` field is a general-JWS structure signing a
//! small payload that binds the message's descriptor CID, `recordId`,
//! and (for protocol-scoped records) `contextId`. This module owns the
//! JWS envelope: assembling `{payload, signatures}` on the way out,
//! and — given a resolved verification key — checking a signature on
//! the way in. The actual DID resolution and signing primitive are
//! external collaborators, named here only by their interface
//! contracts ([`DidResolver`], [`Signer`]), per spec.

use base64ct::{Base64UrlUnpadded, Encoding};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, forbidden, unexpected};

/// A resolved DID document, scoped to what authorization needs from it:
/// the set of verification methods a `kid` can be matched against.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Document {
    /// Verification methods declared by the DID document.
    #[serde(default)]
    pub verification_method: Vec<VerificationMethod>,
}

/// A single verification method entry of a DID document.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct VerificationMethod {
    /// The verification method's id, e.g. `did:example:abc#key-1`.
    pub id: String,

    /// Raw public key bytes, base64url (no padding) encoded.
    pub public_key_multibase: String,
}

/// DID resolution collaborator. Implementations are expected to reach
/// an actual DID method resolver; this crate only consumes the
/// resulting document.
#[async_trait::async_trait]
pub trait DidResolver: Send + Sync {
    /// Resolve `did_url` to its DID document.
    async fn resolve(&self, did_url: &str) -> Result<Document>;
}

/// Signing collaborator used when constructing outbound messages.
/// Implementations hold (or have access to) a private key and produce
/// raw signature bytes over arbitrary payload bytes.
#[async_trait::async_trait]
pub trait Signer: Send + Sync {
    /// Sign `payload`, returning the raw signature bytes.
    async fn try_sign(&self, payload: &[u8]) -> anyhow::Result<Vec<u8>>;

    /// The raw public key bytes corresponding to the signing key.
    async fn public_key(&self) -> anyhow::Result<Vec<u8>>;

    /// The DID URL (including `#fragment`) identifying the verification
    /// method used to sign, carried as the JWS `kid`.
    fn verification_method(&self) -> String;
}

/// General-JWS structure: a payload and one or more signatures over it.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Jws {
    /// Base64url (unpadded) JSON payload.
    pub payload: String,

    /// One entry per signature over `payload`.
    pub signatures: Vec<JwsSignature>,
}

/// A single signature entry within a [`Jws`].
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JwsSignature {
    /// Base64url (unpadded) JSON protected header, containing at least
    /// `alg` and `kid`.
    pub protected: String,

    /// Base64url (unpadded) raw signature bytes.
    pub signature: String,
}

/// Protected JWS header.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Protected {
    /// Signing algorithm identifier.
    pub alg: String,

    /// Verification method id (`did#fragment`) used to sign.
    pub kid: String,
}

/// The decoded, signed payload of a message's authorization JWS —
/// binds the outer message's descriptor CID, `recordId`, and (when
/// protocol-scoped) `contextId`.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignaturePayload {
    /// CID of the message's descriptor.
    pub descriptor_cid: String,

    /// The message's `recordId`, bound to prevent substitution.
    pub record_id: String,

    /// The message's `contextId`, when protocol-scoped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
}

/// Wraps the general-JWS for a message's `authorization` field, with
/// convenience accessors for the decoded payload and author DID.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    /// The authorizing general-JWS.
    pub signature: Jws,
}

impl Authorization {
    /// Decode the signed [`SignaturePayload`].
    pub fn payload(&self) -> Result<SignaturePayload> {
        let bytes = Base64UrlUnpadded::decode_vec(&self.signature.payload)?;
        serde_json::from_slice(&bytes).map_err(Into::into)
    }

    /// The DID of the message's author — the DID portion of the first
    /// signature's `kid`.
    pub fn author(&self) -> Result<String> {
        let protected = self.protected(0)?;
        let (did, _fragment) = protected
            .kid
            .split_once('#')
            .ok_or_else(|| forbidden!("verification method `kid` is not a DID URL"))?;
        Ok(did.to_string())
    }

    fn protected(&self, index: usize) -> Result<Protected> {
        let entry =
            self.signature.signatures.get(index).ok_or_else(|| forbidden!("missing signature"))?;
        let bytes = Base64UrlUnpadded::decode_vec(&entry.protected)?;
        serde_json::from_slice(&bytes).map_err(Into::into)
    }

    /// Verify every signature against a key resolved from its `kid`'s
    /// DID. Fails closed: any unresolvable DID, unmatched `kid`, or bad
    /// signature rejects the whole message.
    pub async fn verify(&self, resolver: &impl DidResolver) -> Result<()> {
        for (i, entry) in self.signature.signatures.iter().enumerate() {
            let protected = self.protected(i)?;
            let (did, _fragment) = protected
                .kid
                .split_once('#')
                .ok_or_else(|| forbidden!("verification method `kid` is not a DID URL"))?;

            let document = resolver
                .resolve(did)
                .await
                .map_err(|e| forbidden!("unable to resolve DID `{did}`: {e}"))?;

            let method = document
                .verification_method
                .iter()
                .find(|m| m.id == protected.kid)
                .ok_or_else(|| forbidden!("no verification method matching `{}`", protected.kid))?;

            let key_bytes = Base64UrlUnpadded::decode_vec(&method.public_key_multibase)?;
            let key_array: [u8; 32] = key_bytes
                .try_into()
                .map_err(|_| forbidden!("invalid verification key length"))?;
            let verifying_key = VerifyingKey::from_bytes(&key_array)
                .map_err(|e| forbidden!("invalid verification key: {e}"))?;

            let sig_bytes = Base64UrlUnpadded::decode_vec(&entry.signature)?;
            let sig_array: [u8; 64] =
                sig_bytes.try_into().map_err(|_| forbidden!("invalid signature length"))?;
            let signature = Signature::from_bytes(&sig_array);

            let signed = format!("{}.{}", entry.protected, self.signature.payload);
            verifying_key
                .verify(signed.as_bytes(), &signature)
                .map_err(|e| forbidden!("signature verification failed: {e}"))?;
        }
        Ok(())
    }
}

/// Builds an [`Authorization`] for an outbound message.
#[derive(Clone, Debug, Default)]
pub struct AuthorizationBuilder {
    descriptor_cid: String,
    record_id: String,
    context_id: Option<String>,
}

impl AuthorizationBuilder {
    /// Start a new builder for the message whose descriptor hashes to
    /// `descriptor_cid`.
    #[must_use]
    pub fn new(descriptor_cid: impl Into<String>) -> Self {
        Self {
            descriptor_cid: descriptor_cid.into(),
            record_id: String::new(),
            context_id: None,
        }
    }

    /// The message's `recordId`, bound into the signed payload.
    #[must_use]
    pub fn record_id(mut self, record_id: impl Into<String>) -> Self {
        self.record_id = record_id.into();
        self
    }

    /// The message's `contextId`, when protocol-scoped.
    #[must_use]
    pub fn context_id(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = Some(context_id.into());
        self
    }

    /// Sign and assemble the [`Authorization`].
    ///
    /// # Errors
    /// Returns an error if the payload cannot be serialized or the
    /// signer fails to produce a signature.
    pub async fn build(self, signer: &impl Signer) -> Result<Authorization> {
        let payload = SignaturePayload {
            descriptor_cid: self.descriptor_cid,
            record_id: self.record_id,
            context_id: self.context_id,
        };
        let payload_b64 = Base64UrlUnpadded::encode_string(&serde_json::to_vec(&payload)?);

        let protected = Protected {
            alg: "EdDSA".to_string(),
            kid: signer.verification_method(),
        };
        let protected_b64 = Base64UrlUnpadded::encode_string(&serde_json::to_vec(&protected)?);

        let signing_input = format!("{protected_b64}.{payload_b64}");
        let signature_bytes = signer
            .try_sign(signing_input.as_bytes())
            .await
            .map_err(|e| unexpected!("signing failed: {e}"))?;
        let signature_b64 = Base64UrlUnpadded::encode_string(&signature_bytes);

        Ok(Authorization {
            signature: Jws {
                payload: payload_b64,
                signatures: vec![JwsSignature {
                    protected: protected_b64,
                    signature: signature_b64,
                }],
            },
        })
    }
}

impl From<ed25519_dalek::SignatureError> for Error {
    fn from(e: ed25519_dalek::SignatureError) -> Self {
        forbidden!("signature error: {e}")
    }
}
