//! Integration tests for the clip catalog
//!
//! Tests cover:
//! - Identifier allocation (sequential and concurrent)
//! - add_clip / find_by_reference by identifier and by name
//! - Tag / untag semantics, including batch validation
//! - Catalog reset

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use clipcat_common::catalog::registry::default_mappings;
use clipcat_common::catalog::{reset_all, GENERIC_PREFIX, NEW_TAG};
use clipcat_common::db::{DocumentStore, SqliteDocumentStore};
use clipcat_common::{ClipCatalog, Error};
use tempfile::TempDir;

/// Test helper: catalog over an in-memory store with the default prefix table
async fn setup_catalog() -> (Arc<dyn DocumentStore>, ClipCatalog) {
    let store: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::in_memory().await.unwrap());
    let catalog = ClipCatalog::new(Arc::clone(&store));
    catalog.registry().initialize(&default_mappings()).await.unwrap();
    (store, catalog)
}

fn no_tags() -> BTreeSet<String> {
    BTreeSet::new()
}

fn refs(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

// =============================================================================
// Allocation
// =============================================================================

#[tokio::test]
async fn test_sequential_allocations_strictly_increase() {
    let (_store, catalog) = setup_catalog().await;

    let mut identifiers = Vec::new();
    for i in 0..5 {
        let added = catalog
            .add_clip(&format!("jake_line{}.wav", i), Utc::now(), no_tags())
            .await
            .unwrap();
        identifiers.push(added.identifier);
    }

    assert_eq!(identifiers, vec!["ja0", "ja1", "ja2", "ja3", "ja4"]);
}

#[tokio::test]
async fn test_concurrent_allocations_never_collide() {
    let temp_dir = TempDir::new().unwrap();
    let store: Arc<dyn DocumentStore> = Arc::new(
        SqliteDocumentStore::connect(&temp_dir.path().join("clips.db"))
            .await
            .unwrap(),
    );
    let catalog = ClipCatalog::new(Arc::clone(&store));
    catalog.registry().initialize(&default_mappings()).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..20 {
        let registry = catalog.registry().clone();
        handles.push(tokio::spawn(async move {
            registry.allocate(&format!("dom_{}", i)).await.unwrap()
        }));
    }

    let mut numbers = Vec::new();
    for handle in handles {
        let allocation = handle.await.unwrap();
        assert!(allocation.identifier.starts_with("dh"));
        numbers.push(allocation.identifier[2..].parse::<u64>().unwrap());
    }

    let unique: HashSet<u64> = numbers.iter().copied().collect();
    assert_eq!(unique.len(), 20, "duplicate identifiers allocated: {:?}", numbers);
    assert_eq!(unique, (0..20).collect::<HashSet<u64>>());
}

#[tokio::test]
async fn test_unknown_prefix_falls_back_to_generic() {
    let (_store, catalog) = setup_catalog().await;

    let added = catalog
        .add_clip("airhorn.mp3", Utc::now(), no_tags())
        .await
        .unwrap();
    assert_eq!(added.identifier, "0");
    assert_eq!(added.name, "airhorn");

    let clip = catalog.find_by_reference("airhorn").await.unwrap();
    assert_eq!(clip.file_prefix, GENERIC_PREFIX);
}

#[tokio::test]
async fn test_add_clip_without_registry_fails() {
    let store: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::in_memory().await.unwrap());
    let catalog = ClipCatalog::new(store);

    let result = catalog.add_clip("dom_a.wav", Utc::now(), no_tags()).await;
    assert!(matches!(result, Err(Error::RegistryNotFound(_))));
    assert!(catalog.get_clips(None).await.unwrap().is_empty());
}

// =============================================================================
// Lookup
// =============================================================================

#[tokio::test]
async fn test_find_by_identifier_and_name_return_same_clip() {
    let (_store, catalog) = setup_catalog().await;
    let upload_time = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

    let added = catalog
        .add_clip("dom_greeting.wav", upload_time, no_tags())
        .await
        .unwrap();

    let by_id = catalog.find_by_reference(&added.identifier).await.unwrap();
    let by_name = catalog.find_by_reference("dom_greeting").await.unwrap();

    assert_eq!(by_id, by_name);
    assert_eq!(by_id.identifier, "dh0");
    assert_eq!(by_id.file, "dom_greeting.wav");
    assert_eq!(by_id.file_prefix, "dom_");
    assert_eq!(by_id.creation_time, upload_time);
    assert!(!by_id.record_id.is_empty());

    assert_eq!(
        catalog.get_file_by_reference("dh0").await.unwrap(),
        "dom_greeting.wav"
    );
}

#[tokio::test]
async fn test_identifier_wins_over_name() {
    let (_store, catalog) = setup_catalog().await;

    // Generic clip named "dh0" is added second; "dh0" must still resolve to the
    // identifier of the first clip.
    catalog.add_clip("dom_a.wav", Utc::now(), no_tags()).await.unwrap();
    catalog.add_clip("dh0.wav", Utc::now(), no_tags()).await.unwrap();

    let clip = catalog.find_by_reference("dh0").await.unwrap();
    assert_eq!(clip.name, "dom_a");
}

#[tokio::test]
async fn test_find_unknown_reference_is_clip_not_found() {
    let (_store, catalog) = setup_catalog().await;

    let result = catalog.find_by_reference("nope").await;
    assert!(matches!(result, Err(Error::ClipNotFound(r)) if r == "nope"));
}

#[tokio::test]
async fn test_get_clips_filters_by_tag_and_names_follow_store_order() {
    let (_store, catalog) = setup_catalog().await;
    let new_tags: BTreeSet<String> = [NEW_TAG.to_string()].into_iter().collect();

    catalog.add_clip("dom_a.wav", Utc::now(), new_tags.clone()).await.unwrap();
    catalog.add_clip("jake_b.wav", Utc::now(), no_tags()).await.unwrap();
    catalog.add_clip("ollie_c.wav", Utc::now(), new_tags).await.unwrap();

    let all = catalog.get_clips(None).await.unwrap();
    assert_eq!(all.len(), 3);

    let fresh: Vec<String> = catalog
        .get_clips(Some(NEW_TAG))
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(fresh, vec!["dom_a", "ollie_c"]);

    assert_eq!(
        catalog.get_all_names().await.unwrap(),
        vec!["dom_a", "jake_b", "ollie_c"]
    );
}

// =============================================================================
// Tagging
// =============================================================================

#[tokio::test]
async fn test_tag_is_idempotent_and_sorted() {
    let (_store, catalog) = setup_catalog().await;
    catalog.add_clip("dom_a.wav", Utc::now(), no_tags()).await.unwrap();

    catalog.tag(&refs(&["dh0"]), "zesty").await.unwrap();
    catalog.tag(&refs(&["dh0"]), "new").await.unwrap();
    catalog.tag(&refs(&["dom_a"]), "new").await.unwrap();

    let clip = catalog.find_by_reference("dh0").await.unwrap();
    let tags: Vec<&str> = clip.tags.iter().map(String::as_str).collect();
    assert_eq!(tags, vec!["new", "zesty"]);
}

#[tokio::test]
async fn test_tag_then_untag_restores_original_tags() {
    let (_store, catalog) = setup_catalog().await;
    let original: BTreeSet<String> = ["classic".to_string()].into_iter().collect();
    catalog.add_clip("dom_a.wav", Utc::now(), original.clone()).await.unwrap();
    catalog.add_clip("jake_b.wav", Utc::now(), no_tags()).await.unwrap();

    let targets = refs(&["dh0", "jake_b"]);
    catalog.tag(&targets, "funny").await.unwrap();
    assert!(catalog.find_by_reference("ja0").await.unwrap().has_tag("funny"));

    catalog.untag(&targets, "funny").await.unwrap();
    assert_eq!(catalog.find_by_reference("dh0").await.unwrap().tags, original);
    assert!(catalog.find_by_reference("ja0").await.unwrap().tags.is_empty());
}

#[tokio::test]
async fn test_untag_missing_tag_fails_without_writing() {
    let (_store, catalog) = setup_catalog().await;
    catalog.add_clip("dom_a.wav", Utc::now(), no_tags()).await.unwrap();
    catalog.add_clip("jake_b.wav", Utc::now(), no_tags()).await.unwrap();
    catalog.tag(&refs(&["dh0"]), "funny").await.unwrap();

    let result = catalog.untag(&refs(&["dh0", "ja0"]), "funny").await;
    assert!(matches!(
        result,
        Err(Error::TagNotPresent { ref reference, ref tag }) if reference == "ja0" && tag == "funny"
    ));

    // Batch aborted before any write: dh0 keeps its tag
    assert!(catalog.find_by_reference("dh0").await.unwrap().has_tag("funny"));
}

#[tokio::test]
async fn test_tag_with_unknown_reference_aborts_batch() {
    let (_store, catalog) = setup_catalog().await;
    catalog.add_clip("dom_a.wav", Utc::now(), no_tags()).await.unwrap();

    let result = catalog.tag(&refs(&["dh0", "ghost"]), "funny").await;
    assert!(matches!(result, Err(Error::ClipNotFound(r)) if r == "ghost"));
    assert!(!catalog.find_by_reference("dh0").await.unwrap().has_tag("funny"));
}

#[tokio::test]
async fn test_untag_same_clip_referenced_twice() {
    let (_store, catalog) = setup_catalog().await;
    catalog.add_clip("dom_a.wav", Utc::now(), no_tags()).await.unwrap();
    catalog.tag(&refs(&["dh0"]), "funny").await.unwrap();

    let updated = catalog
        .untag(&refs(&["dh0", "dom_a"]), "funny")
        .await
        .unwrap();
    assert_eq!(updated.len(), 1);
    assert!(updated[0].tags.is_empty());
}

// =============================================================================
// Reset
// =============================================================================

#[tokio::test]
async fn test_reset_all_empties_catalog_and_restarts_counters() {
    let (store, catalog) = setup_catalog().await;
    catalog.add_clip("dom_a.wav", Utc::now(), no_tags()).await.unwrap();
    catalog.add_clip("dom_b.wav", Utc::now(), no_tags()).await.unwrap();
    catalog.add_clip("other.wav", Utc::now(), no_tags()).await.unwrap();

    let summary = reset_all(Arc::clone(&store)).await.unwrap();
    assert_eq!(summary.clips_deleted, 3);

    assert!(catalog.get_clips(None).await.unwrap().is_empty());

    let added = catalog.add_clip("dom_c.wav", Utc::now(), no_tags()).await.unwrap();
    assert_eq!(added.identifier, "dh0");
    let generic = catalog.add_clip("other.wav", Utc::now(), no_tags()).await.unwrap();
    assert_eq!(generic.identifier, "0");
}
