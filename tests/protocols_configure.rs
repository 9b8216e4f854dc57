//! Protocol installation and the `allow.anyone`/`allow.recipient`
//! authorization rules evaluated against an inbound `CollectionsWrite`.

use std::collections::BTreeMap;

use dwn_core::protocols::{
    Action, Allow, AnyoneRule, ConfigureBuilder, LabelDefinition, ProtocolDefinition, RecipientRule,
    RecordDefinition,
};
use dwn_core::records::{WriteBuilder, WriteData};
use dwn_core::{handle_message, Error};
use dwn_test_support::{provider, Keyring, ALICE_DID, BOB_DID};

fn bytes(s: &str) -> WriteData {
    WriteData::Bytes { data: s.as_bytes().to_vec() }
}

/// A "social" protocol: anyone may write a root `post`; only the post's
/// `recipient` may write a `comment` child of it.
fn social_protocol() -> ProtocolDefinition {
    let mut labels = BTreeMap::new();
    labels.insert("post".to_string(), LabelDefinition { schema: "https://example.com/post".to_string() });
    labels.insert("comment".to_string(), LabelDefinition { schema: "https://example.com/comment".to_string() });

    let comment = RecordDefinition {
        allow: Some(Allow {
            anyone: None,
            recipient: Some(RecipientRule { of: "post".to_string(), to: vec![Action::Write] }),
        }),
        records: BTreeMap::new(),
    };

    let mut post_children = BTreeMap::new();
    post_children.insert("comment".to_string(), comment);

    let post = RecordDefinition {
        allow: Some(Allow { anyone: Some(AnyoneRule { to: vec![Action::Write] }), recipient: None }),
        records: post_children,
    };

    let mut records = BTreeMap::new();
    records.insert("post".to_string(), post);

    ProtocolDefinition { protocol: "https://example.com/social".to_string(), labels, records }
}

#[tokio::test]
async fn anyone_rule_permits_a_root_record_write() {
    let alice = Keyring::new(ALICE_DID);
    let bob = Keyring::new(BOB_DID);
    let provider = provider(&[&alice, &bob]);

    let configure = ConfigureBuilder::new().definition(social_protocol()).build(&alice).await.unwrap();
    handle_message(ALICE_DID, configure, &provider).await.unwrap();

    let post = WriteBuilder::new()
        .data(bytes("hello"))
        .protocol("https://example.com/social")
        .schema("https://example.com/post")
        .recipient(ALICE_DID)
        .build(&bob)
        .await
        .unwrap();
    let reply = handle_message(ALICE_DID, post, &provider).await.unwrap();
    assert_eq!(reply.status.code, 200);
}

#[tokio::test]
async fn recipient_rule_permits_child_write_from_matching_recipient() {
    let alice = Keyring::new(ALICE_DID);
    let bob = Keyring::new(BOB_DID);
    let provider = provider(&[&alice, &bob]);

    let configure = ConfigureBuilder::new().definition(social_protocol()).build(&alice).await.unwrap();
    handle_message(ALICE_DID, configure, &provider).await.unwrap();

    let post = WriteBuilder::new()
        .data(bytes("hello"))
        .protocol("https://example.com/social")
        .schema("https://example.com/post")
        .recipient(BOB_DID)
        .build(&alice)
        .await
        .unwrap();
    handle_message(ALICE_DID, post.clone(), &provider).await.unwrap();

    let comment = WriteBuilder::new()
        .data(bytes("nice post"))
        .protocol("https://example.com/social")
        .schema("https://example.com/comment")
        .protocol_parent(&post)
        .build(&bob)
        .await
        .unwrap();
    let reply = handle_message(ALICE_DID, comment, &provider).await.unwrap();
    assert_eq!(reply.status.code, 200);
}

#[tokio::test]
async fn recipient_rule_rejects_write_from_non_recipient() {
    let alice = Keyring::new(ALICE_DID);
    let bob = Keyring::new(BOB_DID);
    let carol = Keyring::new("did:key:carol");
    let provider = provider(&[&alice, &bob, &carol]);

    let configure = ConfigureBuilder::new().definition(social_protocol()).build(&alice).await.unwrap();
    handle_message(ALICE_DID, configure, &provider).await.unwrap();

    let post = WriteBuilder::new()
        .data(bytes("hello"))
        .protocol("https://example.com/social")
        .schema("https://example.com/post")
        .recipient(BOB_DID)
        .build(&alice)
        .await
        .unwrap();
    handle_message(ALICE_DID, post.clone(), &provider).await.unwrap();

    let comment = WriteBuilder::new()
        .data(bytes("i'm not bob"))
        .protocol("https://example.com/social")
        .schema("https://example.com/comment")
        .protocol_parent(&post)
        .build(&carol)
        .await
        .unwrap();
    let err = handle_message(ALICE_DID, comment, &provider).await.unwrap_err();
    match err {
        Error::Forbidden(detail) => assert!(detail.contains("unexpected inbound message author")),
        other => panic!("expected Forbidden, got {other:?}"),
    }
}

#[tokio::test]
async fn write_against_unconfigured_protocol_is_rejected() {
    let alice = Keyring::new(ALICE_DID);
    let provider = provider(&[&alice]);

    let post = WriteBuilder::new()
        .data(bytes("hello"))
        .protocol("https://example.com/unconfigured")
        .schema("https://example.com/post")
        .recipient(ALICE_DID)
        .build(&alice)
        .await
        .unwrap();
    let err = handle_message(ALICE_DID, post, &provider).await.unwrap_err();
    match err {
        Error::Forbidden(detail) => assert!(detail.contains("unable to find protocol definition")),
        other => panic!("expected Forbidden, got {other:?}"),
    }
}

#[tokio::test]
async fn schema_not_recognised_by_protocol_is_rejected() {
    let alice = Keyring::new(ALICE_DID);
    let provider = provider(&[&alice]);

    let configure = ConfigureBuilder::new().definition(social_protocol()).build(&alice).await.unwrap();
    handle_message(ALICE_DID, configure, &provider).await.unwrap();

    let mystery = WriteBuilder::new()
        .data(bytes("??"))
        .protocol("https://example.com/social")
        .schema("https://example.com/mystery")
        .build(&alice)
        .await
        .unwrap();
    let err = handle_message(ALICE_DID, mystery, &provider).await.unwrap_err();
    match err {
        Error::Forbidden(detail) => assert!(detail.contains("not allowed in protocol")),
        other => panic!("expected Forbidden, got {other:?}"),
    }
}
