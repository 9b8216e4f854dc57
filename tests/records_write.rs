//! Conflict resolution, lineage, and immutable-field behavior of
//! `CollectionsWrite`.

use chrono::{Duration, Utc};
use dwn_core::records::{WriteBuilder, WriteData};
use dwn_core::{handle_message, Error, Message};
use dwn_test_support::{provider, Keyring, ALICE_DID};

fn bytes(s: &str) -> WriteData {
    WriteData::Bytes { data: s.as_bytes().to_vec() }
}

#[tokio::test]
async fn later_date_modified_supersedes() {
    let alice = Keyring::new(ALICE_DID);
    let provider = provider(&[&alice]);
    let now = Utc::now();

    let write1 =
        WriteBuilder::new().data(bytes("v1")).date_modified(now).build(&alice).await.unwrap();
    let reply = handle_message(ALICE_DID, write1.clone(), &provider).await.unwrap();
    assert_eq!(reply.status.code, 200);

    let write2 = WriteBuilder::new()
        .data(bytes("v2"))
        .update(&write1)
        .date_modified(now + Duration::seconds(1))
        .build(&alice)
        .await
        .unwrap();
    let reply = handle_message(ALICE_DID, write2, &provider).await.unwrap();
    assert_eq!(reply.status.code, 200);
}

#[tokio::test]
async fn stale_date_modified_is_rejected_as_conflict() {
    let alice = Keyring::new(ALICE_DID);
    let provider = provider(&[&alice]);
    let now = Utc::now();

    let write1 =
        WriteBuilder::new().data(bytes("v1")).date_modified(now).build(&alice).await.unwrap();
    handle_message(ALICE_DID, write1.clone(), &provider).await.unwrap();

    let write2 = WriteBuilder::new()
        .data(bytes("v2"))
        .update(&write1)
        .date_modified(now - Duration::seconds(1))
        .build(&alice)
        .await
        .unwrap();
    let reply = handle_message(ALICE_DID, write2, &provider).await.unwrap();
    assert_eq!(reply.status.code, 409);
}

#[tokio::test]
async fn equal_date_modified_breaks_tie_on_cid() {
    let alice = Keyring::new(ALICE_DID);
    let provider = provider(&[&alice]);
    let now = Utc::now();

    let write1 =
        WriteBuilder::new().data(bytes("v1")).date_modified(now).build(&alice).await.unwrap();
    handle_message(ALICE_DID, write1.clone(), &provider).await.unwrap();

    // Two candidate second versions sharing the same dateModified: the one
    // with the lexicographically larger CID must win, regardless of
    // arrival order.
    let candidate_a = WriteBuilder::new()
        .data(bytes("candidate-a"))
        .update(&write1)
        .date_modified(now)
        .build(&alice)
        .await
        .unwrap();
    let candidate_b = WriteBuilder::new()
        .data(bytes("candidate-b"))
        .update(&write1)
        .date_modified(now)
        .build(&alice)
        .await
        .unwrap();

    let (first, second) = if candidate_a.cid().unwrap() < candidate_b.cid().unwrap() {
        (candidate_a, candidate_b)
    } else {
        (candidate_b, candidate_a)
    };

    let winner_cid = second.cid().unwrap();
    handle_message(ALICE_DID, first, &provider).await.unwrap();
    let reply = handle_message(ALICE_DID, second, &provider).await.unwrap();
    assert_eq!(reply.status.code, 200);

    let (entries, _) = dwn_core::provider::MessageStore::query(
        &provider,
        ALICE_DID,
        &dwn_core::store::Query::new(dwn_core::records::RecordsFilter::new().record_id(write1.record_id.clone())),
    )
    .await
    .unwrap();
    let tip = entries.into_iter().find_map(|e| e.as_write().cloned()).unwrap();
    assert_eq!(tip.cid().unwrap(), winner_cid);
}

#[tokio::test]
async fn duplicate_write_is_idempotent() {
    let alice = Keyring::new(ALICE_DID);
    let provider = provider(&[&alice]);

    let write1 = WriteBuilder::new().data(bytes("v1")).build(&alice).await.unwrap();
    handle_message(ALICE_DID, write1.clone(), &provider).await.unwrap();
    let reply = handle_message(ALICE_DID, write1, &provider).await.unwrap();
    assert_eq!(reply.status.code, 202);
}

#[tokio::test]
async fn changing_an_immutable_field_is_rejected() {
    let alice = Keyring::new(ALICE_DID);
    let provider = provider(&[&alice]);

    let write1 =
        WriteBuilder::new().data(bytes("v1")).data_format("text/plain").build(&alice).await.unwrap();
    handle_message(ALICE_DID, write1.clone(), &provider).await.unwrap();

    let write2 = WriteBuilder::new()
        .data(bytes("v2"))
        .update(&write1)
        .data_format("application/json")
        .build(&alice)
        .await
        .unwrap();
    let err = handle_message(ALICE_DID, write2, &provider).await.unwrap_err();
    match err {
        Error::BadRequest(detail) => assert!(detail.contains("immutable property")),
        other => panic!("expected BadRequest, got {other:?}"),
    }
}

#[tokio::test]
async fn wrong_lineage_parent_is_rejected() {
    let alice = Keyring::new(ALICE_DID);
    let provider = provider(&[&alice]);

    let write1 = WriteBuilder::new().data(bytes("v1")).build(&alice).await.unwrap();
    handle_message(ALICE_DID, write1.clone(), &provider).await.unwrap();

    let mut write2 =
        WriteBuilder::new().data(bytes("v2")).update(&write1).build(&alice).await.unwrap();
    write2.lineage_parent = Some("bafyreibogus".to_string());

    let err = handle_message(ALICE_DID, write2, &provider).await.unwrap_err();
    match err {
        Error::BadRequest(detail) => assert!(detail.contains("expecting lineageParent to be")),
        other => panic!("expected BadRequest, got {other:?}"),
    }
}

#[tokio::test]
async fn update_with_no_existing_record_is_rejected() {
    let alice = Keyring::new(ALICE_DID);
    let provider = provider(&[&alice]);

    let write1 = WriteBuilder::new().data(bytes("v1")).build(&alice).await.unwrap();
    let mut orphan_update = write1.clone();
    orphan_update.lineage_parent = Some("bafyreibogus".to_string());

    let err = handle_message(ALICE_DID, orphan_update, &provider).await.unwrap_err();
    match err {
        Error::BadRequest(detail) => assert!(detail.contains("unable to find the lineage root")),
        other => panic!("expected BadRequest, got {other:?}"),
    }
}
