//! Registry tests against the in-memory store.

use std::sync::Arc;

use chrono::Utc;

use crate::{
  Error,
  catalog::StaticCatalog,
  flags::FeatureFlags,
  flash::Flash,
  kv::KeyValueStore,
  links::FlashLinkRegistry,
  memory::MemoryStore,
  registry::{RegistryKind, RegistryOptions, StatusRegistry},
  target::{TargetRef, TargetStatus},
};

fn registry(store: &MemoryStore, kind: RegistryKind) -> StatusRegistry<MemoryStore> {
  StatusRegistry::new(Arc::new(store.clone()), kind, &RegistryOptions::default())
}

fn links(
  store: &MemoryStore,
  catalog: StaticCatalog,
) -> FlashLinkRegistry<MemoryStore, StaticCatalog> {
  FlashLinkRegistry::new(
    Arc::new(store.clone()),
    Arc::new(catalog),
    &RegistryOptions::default(),
  )
}

fn tk_132() -> TargetRef {
  TargetRef {
    id:        "TK_132".into(),
    name:      Some("TK_132".into()),
    lat:       35.6595,
    lng:       139.7005,
    image_url: Some("https://img.example/tk_132.png".into()),
  }
}

fn pa(n: u32) -> TargetRef { TargetRef::new(format!("PA_{n:02}"), 48.85, 2.35) }

// ─── Status registry ─────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_user_reads_empty_without_persisting() {
  let store = MemoryStore::new();
  let hunt = registry(&store, RegistryKind::Hunt);

  let c = hunt.get_collection(42).await;
  assert_eq!(c.fid, 42);
  assert!(c.items.is_empty());
  assert_eq!(c.stats.last_updated, None);
  assert_eq!(store.get("hunt:42").await.unwrap(), None);
}

#[tokio::test]
async fn wishlist_add_mark_found_remove() {
  let store = MemoryStore::new();
  let wishlist = registry(&store, RegistryKind::Wishlist);

  wishlist.add_target(42, &tk_132()).await.unwrap();
  let c = wishlist.get_collection(42).await;
  assert_eq!(c.items.len(), 1);
  assert_eq!(c.items[0].id, "TK_132");
  assert_eq!(c.items[0].status, TargetStatus::WantToFind);
  assert_eq!(c.items[0].photo_url, "/invaders/TK/TK_132.png");
  assert_eq!(c.stats.total_wanted, 1);
  assert_eq!(c.stats.total_found, 0);

  let c = wishlist.set_status(42, "TK_132", TargetStatus::Alive).await.unwrap();
  assert_eq!(c.stats.total_wanted, 0);
  assert_eq!(c.stats.total_found, 1);

  let c = wishlist.remove_target(42, "TK_132").await.unwrap();
  assert!(c.items.is_empty());
  assert_eq!(c.stats.total_wanted, 0);
  assert_eq!(c.stats.total_found, 0);
  assert_eq!(c.stats.total_alive, 0);
  assert_eq!(c.stats.total_dead, 0);
}

#[tokio::test]
async fn removing_absent_target_is_noop() {
  let store = MemoryStore::new();
  let hunt = registry(&store, RegistryKind::Hunt);
  let before = hunt.add_target(1, &pa(1)).await.unwrap();

  let after = hunt.remove_target(1, "PA_99").await.unwrap();
  assert_eq!(after.items, before.items);
  assert_eq!(after.stats.last_updated, before.stats.last_updated);
}

#[tokio::test]
async fn readd_resets_status_and_refreshes_added_date() {
  let store = MemoryStore::new();
  let saved = registry(&store, RegistryKind::Saved);

  let first = saved.add_target(5, &pa(5)).await.unwrap();
  let added = first.items[0].added_date;
  saved.mark_as_dead(5, "PA_05").await.unwrap();

  let c = saved.add_target(5, &pa(5)).await.unwrap();
  assert_eq!(c.items.len(), 1);
  assert_eq!(c.items[0].status, TargetStatus::WantToFind);
  assert!(c.items[0].added_date >= added);
  assert_eq!(c.stats.total_wanted, 1);
  assert_eq!(c.stats.total_dead, 0);
}

#[tokio::test]
async fn set_status_on_untracked_target_does_not_add_it() {
  let store = MemoryStore::new();
  let hunt = registry(&store, RegistryKind::Hunt);

  let c = hunt.mark_as_found(3, "PA_01").await.unwrap();
  assert!(c.items.is_empty());
  assert_eq!(hunt.get_status(3, "PA_01").await, None);
  assert_eq!(store.get("hunt:3").await.unwrap(), None);
}

#[tokio::test]
async fn mutation_result_matches_next_read() {
  let store = MemoryStore::new();
  let hunt = registry(&store, RegistryKind::Hunt);

  let results = vec![
    hunt.add_target(8, &pa(1)).await.unwrap(),
    hunt.add_target(8, &pa(2)).await.unwrap(),
    hunt.mark_as_alive(8, "PA_01").await.unwrap(),
    hunt.mark_as_dead(8, "PA_02").await.unwrap(),
    hunt.remove_target(8, "PA_01").await.unwrap(),
  ];
  let last = results.last().cloned().unwrap();
  assert_eq!(hunt.get_collection(8).await, last);
}

#[tokio::test]
async fn stats_stay_consistent_over_mixed_operations() {
  let store = MemoryStore::new();
  let hunt = registry(&store, RegistryKind::Hunt);

  for n in 0..6 {
    hunt.add_target(9, &pa(n)).await.unwrap();
  }
  hunt.mark_as_alive(9, "PA_00").await.unwrap();
  hunt.mark_as_dead(9, "PA_01").await.unwrap();
  hunt.mark_as_dead(9, "PA_02").await.unwrap();
  hunt.remove_target(9, "PA_02").await.unwrap();
  hunt.add_target(9, &pa(0)).await.unwrap();
  let c = hunt.mark_as_alive(9, "PA_03").await.unwrap();

  let count = |s: TargetStatus| c.items.iter().filter(|t| t.status == s).count();
  assert_eq!(c.stats.total_wanted, count(TargetStatus::WantToFind));
  assert_eq!(c.stats.total_alive, count(TargetStatus::Alive));
  assert_eq!(c.stats.total_dead, count(TargetStatus::Dead));
  assert_eq!(c.stats.total_found, c.stats.total_alive + c.stats.total_dead);
  assert_eq!(c.items.len(), 5);

  let summary = hunt.get_stats(9).await;
  assert_eq!(summary.total_items, 5);
  assert_eq!(summary.total_found, 2);
  assert_eq!(summary.completion_rate, 40);
}

#[tokio::test]
async fn last_updated_increases_with_every_write() {
  let store = MemoryStore::new();
  let hunt = registry(&store, RegistryKind::Hunt);

  let mut previous = None;
  for n in 0..5 {
    let c = hunt.add_target(10, &pa(n)).await.unwrap();
    assert!(c.stats.last_updated > previous);
    previous = c.stats.last_updated;
  }
}

#[tokio::test]
async fn stale_persisted_stats_are_recomputed() {
  let store = MemoryStore::new();
  let hunt = registry(&store, RegistryKind::Hunt);
  hunt.add_target(11, &pa(1)).await.unwrap();

  // Simulate a racing writer that changed items but not stats.
  let raw = store.get("hunt:11").await.unwrap().unwrap();
  let mut doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
  doc["stats"]["totalWanted"] = serde_json::json!(17);
  store.set("hunt:11", doc.to_string()).await.unwrap();

  assert_eq!(hunt.get_collection(11).await.stats.total_wanted, 1);
}

#[tokio::test]
async fn legacy_found_documents_read_as_alive() {
  let store = MemoryStore::new();
  let wishlist = registry(&store, RegistryKind::Wishlist);
  let doc = serde_json::json!({
    "fid": 12,
    "items": [{
      "id": "PA_01",
      "name": "PA_01",
      "photoUrl": "/invaders/PA/PA_01.jpg",
      "lat": 48.85,
      "lng": 2.35,
      "addedDate": "2024-03-01T10:00:00Z",
      "status": "found"
    }],
    "stats": { "totalWanted": 0, "totalFound": 1, "lastUpdated": "2024-03-01T10:00:00Z" }
  });
  store.set("wishlist:12", doc.to_string()).await.unwrap();

  assert_eq!(wishlist.get_status(12, "PA_01").await, Some(TargetStatus::Alive));
}

#[tokio::test]
async fn kinds_do_not_share_collections() {
  let store = MemoryStore::new();
  let hunt = registry(&store, RegistryKind::Hunt);
  let saved = registry(&store, RegistryKind::Saved);

  hunt.add_target(13, &pa(1)).await.unwrap();
  assert!(saved.get_collection(13).await.items.is_empty());
}

#[tokio::test]
async fn key_prefix_namespaces_keys() {
  let store = MemoryStore::new();
  let options = RegistryOptions {
    key_prefix:     "flashmap:".into(),
    photo_base_url: "https://cdn.example".into(),
  };
  let hunt = StatusRegistry::new(Arc::new(store.clone()), RegistryKind::Hunt, &options);
  let c = hunt.add_target(14, &tk_132()).await.unwrap();

  assert_eq!(c.items[0].photo_url, "https://cdn.example/TK/TK_132.png");
  assert!(store.get("flashmap:hunt:14").await.unwrap().is_some());
  assert!(store.get("hunt:14").await.unwrap().is_none());
}

#[tokio::test]
async fn invalid_target_is_rejected_before_storage() {
  let store = MemoryStore::new();
  store.set_unavailable(true);
  let hunt = registry(&store, RegistryKind::Hunt);

  let err = hunt.add_target(1, &TargetRef::new("", 0.0, 0.0)).await.unwrap_err();
  assert!(matches!(err, Error::InvalidTarget(_)));
}

// ─── Failure policy ──────────────────────────────────────────────────────────

#[tokio::test]
async fn reads_degrade_when_store_is_down() {
  let store = MemoryStore::new();
  let hunt = registry(&store, RegistryKind::Hunt);
  hunt.add_target(20, &pa(1)).await.unwrap();

  store.set_unavailable(true);
  assert!(hunt.get_collection(20).await.items.is_empty());
  assert!(hunt.read_collection(20).await.degraded);
  assert_eq!(hunt.get_status(20, "PA_01").await, None);
  assert_eq!(hunt.get_stats(20).await.total_items, 0);

  store.set_unavailable(false);
  let read = hunt.read_collection(20).await;
  assert!(!read.degraded);
  assert_eq!(read.collection.items.len(), 1);
}

#[tokio::test]
async fn writes_fail_when_store_is_down() {
  let store = MemoryStore::new();
  let hunt = registry(&store, RegistryKind::Hunt);
  hunt.add_target(21, &pa(1)).await.unwrap();

  store.set_unavailable(true);
  let err = hunt.add_target(21, &pa(2)).await.unwrap_err();
  assert!(matches!(err, Error::Store(_)));

  // The existing collection was not overwritten.
  store.set_unavailable(false);
  let c = hunt.get_collection(21).await;
  assert_eq!(c.items.len(), 1);
  assert_eq!(c.items[0].id, "PA_01");
}

#[tokio::test]
async fn corrupt_document_degrades_reads_and_blocks_writes() {
  let store = MemoryStore::new();
  store.set("hunt:22", "{not json".into()).await.unwrap();
  let hunt = registry(&store, RegistryKind::Hunt);

  assert!(hunt.get_collection(22).await.items.is_empty());
  let err = hunt.add_target(22, &pa(1)).await.unwrap_err();
  assert!(matches!(err, Error::Serialization(_)));
}

#[tokio::test]
async fn duplicate_ids_in_stored_document_count_once() {
  let store = MemoryStore::new();
  let saved = registry(&store, RegistryKind::Saved);
  saved.record_target(23, &pa(1), TargetStatus::Alive).await.unwrap();
  saved.add_target(23, &pa(2)).await.unwrap();

  // An older writer appended PA_01 a second time.
  let raw = store.get("saved:23").await.unwrap().unwrap();
  let mut doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
  let mut dup = doc["items"][0].clone();
  dup["status"] = "dead".into();
  doc["items"].as_array_mut().unwrap().push(dup);
  store.set("saved:23", doc.to_string()).await.unwrap();

  let c = saved.get_collection(23).await;
  assert_eq!(c.items.len(), 2);
  assert_eq!(c.status_of("PA_01"), Some(TargetStatus::Dead));
  assert_eq!(c.stats.total_found, 1);
  assert_eq!(saved.get_stats(23).await.total_items, 2);

  // The next write persists the collapsed collection.
  let c = saved.set_status(23, "PA_01", TargetStatus::Alive).await.unwrap();
  assert_eq!(c.items.len(), 2);
  let raw = store.get("saved:23").await.unwrap().unwrap();
  let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
  assert_eq!(doc["items"].as_array().unwrap().len(), 2);
}

// ─── Flash links ─────────────────────────────────────────────────────────────

fn flash(id: u64, city: &str) -> Flash {
  Flash {
    flash_id:  id,
    city:      city.into(),
    image_url: format!("https://img.example/flash/{id}.jpg"),
    taken_at:  Utc::now(),
    text:      None,
  }
}

#[tokio::test]
async fn link_then_unlink_updates_count() {
  let store = MemoryStore::new();
  let reg = links(&store, StaticCatalog::new());

  reg.link_flash(7, 1001, &pa(5), "Paris").await.unwrap();
  assert_eq!(reg.link_count_for_target(7, "PA_05").await.unwrap(), 1);

  reg.unlink_flash(7, 1001).await.unwrap();
  assert_eq!(reg.link_count_for_target(7, "PA_05").await.unwrap(), 0);
}

#[tokio::test]
async fn relinking_keeps_one_link_per_flash() {
  let store = MemoryStore::new();
  let reg = links(&store, StaticCatalog::new());

  reg.link_flash(7, 1001, &pa(1), "Paris").await.unwrap();
  let l = reg.link_flash(7, 1001, &pa(2), "Paris").await.unwrap();

  let for_flash: Vec<_> = l.links.iter().filter(|x| x.flash_id == 1001).collect();
  assert_eq!(for_flash.len(), 1);
  assert_eq!(for_flash[0].target_id, "PA_02");
  assert_eq!(l.stats.total_links, 1);
  assert_eq!(
    reg.link_for_flash(7, 1001).await.unwrap().map(|x| x.target_id),
    Some("PA_02".into())
  );
}

#[tokio::test]
async fn link_counts_match_links_after_mixed_operations() {
  let store = MemoryStore::new();
  let reg = links(&store, StaticCatalog::new());

  reg.link_flash(7, 1, &pa(1), "Paris").await.unwrap();
  reg.link_flash(7, 2, &pa(1), "Paris").await.unwrap();
  reg.link_flash(7, 3, &pa(2), "Paris").await.unwrap();
  reg.link_flash(7, 2, &pa(2), "Paris").await.unwrap();
  reg.unlink_flash(7, 3).await.unwrap();
  reg.unlink_flash(7, 99).await.unwrap();
  reg.link_flash(7, 4, &pa(1), "Paris").await.unwrap();

  let all = reg.get_links(7).await.unwrap();
  for target in ["PA_01", "PA_02", "PA_03"] {
    let expected = all.links.iter().filter(|l| l.target_id == target).count();
    assert_eq!(reg.link_count_for_target(7, target).await.unwrap(), expected);
  }
  assert_eq!(reg.link_count_for_target(7, "PA_01").await.unwrap(), 2);
  assert_eq!(reg.links_for_target(7, "PA_02").await.unwrap().len(), 1);
}

#[tokio::test]
async fn unlinking_unknown_flash_writes_nothing() {
  let store = MemoryStore::new();
  let reg = links(&store, StaticCatalog::new());
  let l = reg.unlink_flash(7, 5).await.unwrap();
  assert!(l.links.is_empty());
  assert_eq!(store.get("flash_links:7").await.unwrap(), None);
}

#[tokio::test]
async fn linkable_flashes_are_annotated_and_filtered() {
  let store = MemoryStore::new();
  let catalog = StaticCatalog::new().with_flashes(7, vec![
    flash(1001, "Paris"),
    flash(1002, "paris"),
    flash(1003, "Tokyo"),
  ]);
  let reg = links(&store, catalog);
  reg.link_flash(7, 1001, &pa(5), "Paris").await.unwrap();

  let all = reg.linkable_flashes(7, None).await.unwrap();
  assert_eq!(all.len(), 3);

  let paris = reg.linkable_flashes(7, Some("PARIS")).await.unwrap();
  assert_eq!(paris.len(), 2);
  let linked = paris.iter().find(|f| f.flash.flash_id == 1001).unwrap();
  assert_eq!(linked.link.as_ref().unwrap().target_id, "PA_05");
  assert!(paris.iter().find(|f| f.flash.flash_id == 1002).unwrap().link.is_none());
}

#[tokio::test]
async fn link_failures_propagate() {
  let store = MemoryStore::new();
  let reg = links(&store, StaticCatalog::new());
  store.set_unavailable(true);

  assert!(matches!(reg.get_links(7).await, Err(Error::Store(_))));
  assert!(matches!(
    reg.link_flash(7, 1, &pa(1), "Paris").await,
    Err(Error::Store(_))
  ));
  assert!(matches!(reg.unlink_flash(7, 1).await, Err(Error::Store(_))));
}

// ─── Feature flags ───────────────────────────────────────────────────────────

#[tokio::test]
async fn feature_flags_toggle_membership() {
  let store = MemoryStore::new();
  let flags = FeatureFlags::new(Arc::new(store.clone()), &RegistryOptions::default());

  assert!(!flags.is_enabled(3).await.unwrap());
  assert!(flags.set_enabled(3, true).await.unwrap());
  assert!(!flags.set_enabled(3, true).await.unwrap());
  flags.set_enabled(1, true).await.unwrap();
  assert!(flags.is_enabled(3).await.unwrap());
  assert_eq!(flags.enabled_users().await.unwrap(), vec![1, 3]);

  assert!(flags.set_enabled(3, false).await.unwrap());
  assert!(!flags.is_enabled(3).await.unwrap());
  assert_eq!(flags.enabled_users().await.unwrap(), vec![1]);
}
