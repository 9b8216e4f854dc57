//! Signature verification and owner-authorship checks on unprotected
//! (no-protocol) records.

use base64ct::Encoding;
use dwn_core::records::{WriteBuilder, WriteData};
use dwn_core::{handle_message, Error};
use dwn_test_support::{provider, Keyring, ALICE_DID, BOB_DID};

fn bytes(s: &str) -> WriteData {
    WriteData::Bytes { data: s.as_bytes().to_vec() }
}

#[tokio::test]
async fn tampered_signature_is_rejected() {
    let alice = Keyring::new(ALICE_DID);
    let provider = provider(&[&alice]);

    let mut write = WriteBuilder::new().data(bytes("v1")).build(&alice).await.unwrap();
    write.authorization.signature.payload =
        base64ct::Base64UrlUnpadded::encode_string(b"{\"descriptorCid\":\"tampered\",\"recordId\":\"x\"}");

    let err = handle_message(ALICE_DID, write, &provider).await.unwrap_err();
    match err {
        Error::Forbidden(_) => {}
        other => panic!("expected Forbidden, got {other:?}"),
    }
}

#[tokio::test]
async fn tampered_descriptor_with_intact_signature_is_rejected() {
    let alice = Keyring::new(ALICE_DID);
    let provider = provider(&[&alice]);

    // The JWS itself is untouched and verifies fine; only the outer
    // descriptor is swapped after signing. The signed payload only
    // binds `descriptorCid`, so this must be caught by comparing that
    // CID against the (now different) actual descriptor, not by
    // signature verification.
    let mut write = WriteBuilder::new().data(bytes("v1")).build(&alice).await.unwrap();
    write.descriptor.recipient = Some(BOB_DID.to_string());

    let err = handle_message(ALICE_DID, write, &provider).await.unwrap_err();
    match err {
        Error::Forbidden(detail) => assert!(detail.contains("descriptorCid")),
        other => panic!("expected Forbidden, got {other:?}"),
    }
}

#[tokio::test]
async fn unresolvable_author_did_is_rejected() {
    let alice = Keyring::new(ALICE_DID);
    // Bob signs but is never registered with the provider, so his DID
    // cannot be resolved to a verification key.
    let bob = Keyring::new(BOB_DID);
    let provider = provider(&[&alice]);

    let write = WriteBuilder::new().data(bytes("v1")).build(&bob).await.unwrap();
    let err = handle_message(ALICE_DID, write, &provider).await.unwrap_err();
    match err {
        Error::Forbidden(detail) => assert!(detail.contains("unable to resolve DID")),
        other => panic!("expected Forbidden, got {other:?}"),
    }
}

#[tokio::test]
async fn non_owner_author_of_unprotected_record_is_rejected() {
    let alice = Keyring::new(ALICE_DID);
    let bob = Keyring::new(BOB_DID);
    let provider = provider(&[&alice, &bob]);

    // No protocol set: only the owner may write into their own DWN.
    let write = WriteBuilder::new().data(bytes("v1")).build(&bob).await.unwrap();
    let err = handle_message(ALICE_DID, write, &provider).await.unwrap_err();
    match err {
        Error::Forbidden(detail) => assert!(detail.contains("unexpected inbound message author")),
        other => panic!("expected Forbidden, got {other:?}"),
    }
}

#[tokio::test]
async fn owner_author_of_unprotected_record_succeeds() {
    let alice = Keyring::new(ALICE_DID);
    let provider = provider(&[&alice]);

    let write = WriteBuilder::new().data(bytes("v1")).build(&alice).await.unwrap();
    let reply = handle_message(ALICE_DID, write, &provider).await.unwrap();
    assert_eq!(reply.status.code, 200);
}
