//! Behavioral Contract Test: Device Identity and Profile
//!
//! This test verifies the host-facing profile API.
//!
//! Constraints verified:
//! - The device identifier is generated once, has UUID shape and never changes
//! - It survives a restart when the store is durable
//! - Tag and attribute edits follow last-write-wins semantics
//! - The raw push token is stored hex-encoded

mod common;

use common::*;
use pushlite_core::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
use std::collections::BTreeMap;
use std::sync::Arc;

fn assert_uuid_shape(id: &str) {
    assert_eq!(id.len(), 36);
    for (i, c) in id.chars().enumerate() {
        match i {
            8 | 13 | 18 | 23 => assert_eq!(c, '-', "hyphen at {} in {}", i, id),
            _ => assert!(
                c.is_ascii_digit() || ('A'..='F').contains(&c),
                "unexpected {:?} in {}",
                c,
                id
            ),
        }
    }
    assert_eq!(&id[14..15], "4", "random (v4) identifier");
}

#[tokio::test]
async fn device_identifier_is_stable() {
    let store = MemoryKeyValueStore::new();
    let h = Harness::start(
        Arc::new(store.clone()),
        &MockSyncClient::new(),
        &RecordingBackground::new(),
    );

    let first = h.handle.device_identifier().await.unwrap();
    let second = h.handle.device_identifier().await.unwrap();

    assert_uuid_shape(&first);
    assert_eq!(first, second);
    assert_eq!(
        store.get("test.deviceID").await.unwrap(),
        Some(serde_json::json!(first))
    );

    h.stop().await;
}

#[tokio::test]
async fn installations_get_distinct_identifiers() {
    let a = Harness::start(
        Arc::new(MemoryKeyValueStore::new()),
        &MockSyncClient::new(),
        &RecordingBackground::new(),
    );
    let b = Harness::start(
        Arc::new(MemoryKeyValueStore::new()),
        &MockSyncClient::new(),
        &RecordingBackground::new(),
    );

    assert_ne!(
        a.handle.device_identifier().await.unwrap(),
        b.handle.device_identifier().await.unwrap()
    );

    a.stop().await;
    b.stop().await;
}

#[tokio::test]
async fn device_identifier_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profile.json");

    let first = Harness::start(
        Arc::new(FileKeyValueStore::new(&path).await.unwrap()),
        &MockSyncClient::new(),
        &RecordingBackground::new(),
    );
    let id = first.handle.device_identifier().await.unwrap();
    first.stop().await;

    let second = Harness::start(
        Arc::new(FileKeyValueStore::new(&path).await.unwrap()),
        &MockSyncClient::new(),
        &RecordingBackground::new(),
    );
    assert_eq!(second.handle.device_identifier().await.unwrap(), id);
    second.stop().await;
}

#[tokio::test]
async fn tag_edits() {
    let h = Harness::start(
        Arc::new(MemoryKeyValueStore::new()),
        &MockSyncClient::new(),
        &RecordingBackground::new(),
    );

    h.handle.add_tag("a").await.unwrap();
    h.handle.add_tag("b").await.unwrap();
    h.handle.add_tag("a").await.unwrap();
    assert_eq!(h.handle.tags().await.unwrap(), vec!["a", "b", "a"], "duplicates kept");

    h.handle.remove_tag("a").await.unwrap();
    assert_eq!(h.handle.tags().await.unwrap(), vec!["b"], "every occurrence removed");

    h.handle.remove_tag("missing").await.unwrap();
    assert_eq!(h.handle.tags().await.unwrap(), vec!["b"]);

    h.stop().await;
}

#[tokio::test]
async fn attribute_edits() {
    let h = Harness::start(
        Arc::new(MemoryKeyValueStore::new()),
        &MockSyncClient::new(),
        &RecordingBackground::new(),
    );

    h.handle
        .set_attributes(BTreeMap::from([
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
        ]))
        .await
        .unwrap();

    // Merges rather than replaces
    h.handle
        .set_attributes(BTreeMap::from([("b".to_string(), "3".to_string())]))
        .await
        .unwrap();
    h.handle.set_attribute("c", Some("4".to_string())).await.unwrap();
    h.handle.set_attribute("a", None).await.unwrap();

    assert_eq!(
        h.handle.attributes().await.unwrap(),
        BTreeMap::from([
            ("b".to_string(), "3".to_string()),
            ("c".to_string(), "4".to_string()),
        ])
    );

    h.stop().await;
}

#[tokio::test]
async fn push_token_is_stored_as_hex() {
    let store = MemoryKeyValueStore::new();
    let h = Harness::start(
        Arc::new(store.clone()),
        &MockSyncClient::new(),
        &RecordingBackground::new(),
    );

    h.handle
        .set_device_token(&[0x00, 0x0f, 0xab, 0xff])
        .await
        .unwrap();
    h.handle.set_enable_push(true).await.unwrap();

    assert_eq!(
        store.get("test.deviceToken").await.unwrap(),
        Some(serde_json::json!("000fabff"))
    );
    assert_eq!(
        store.get("test.pushEnabled").await.unwrap(),
        Some(serde_json::json!(true))
    );

    h.stop().await;
}
