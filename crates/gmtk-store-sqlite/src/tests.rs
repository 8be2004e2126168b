//! Integration tests for `SqliteStore` against an in-memory database.

use gmtk_core::{
  backup::CURRENT_SCHEMA_VERSION,
  entity::Entity,
  payload::{CampaignMeta, CampaignPayload},
  store::{CHECKSUM_ALGO, CampaignIndex, CampaignStorage, IndexEntry},
};
use serde_json::json;

use crate::{SqliteStore, encode::checksum};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn payload(id: &str, name: &str) -> CampaignPayload {
  let mut payload = CampaignPayload::new(CampaignMeta {
    id: id.into(),
    name: name.into(),
    updated_at: Some("2024-01-01T00:00:00.000Z".into()),
    ..CampaignMeta::default()
  });
  let npc = Entity::new("npc_1", id, "2024-01-01T00:00:00.000Z").with_field("name", "Ameiko");
  payload.npcs.insert(npc.id.clone(), npc);
  payload
}

fn entry(id: &str, name: &str) -> IndexEntry {
  IndexEntry::for_payload(&payload(id, name))
}

// ─── Index ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_store_has_empty_index() {
  let s = store().await;
  let index = s.load_index().await.unwrap();
  assert_eq!(index.schema_version, CURRENT_SCHEMA_VERSION);
  assert!(index.campaigns.is_empty());
  assert!(index.last_opened_campaign_id.is_none());
}

#[tokio::test]
async fn index_round_trips_in_order() {
  let s = store().await;
  let mut fixture = entry("cmp_b", "Demo");
  fixture.is_fixture = true;
  fixture.fixture_id = Some("demo".into());
  fixture.fixture_version = Some(json!(3));

  let index = CampaignIndex {
    schema_version:          CURRENT_SCHEMA_VERSION,
    last_opened_campaign_id: Some("cmp_b".into()),
    campaigns:               vec![entry("cmp_z", "Zeta"), fixture, entry("cmp_a", "Alpha")],
  };
  s.save_index(index.clone()).await.unwrap();

  assert_eq!(s.load_index().await.unwrap(), index);
}

#[tokio::test]
async fn save_index_replaces_previous_entries() {
  let s = store().await;
  let mut index = CampaignIndex::default();
  index.upsert(entry("cmp_a", "Alpha"));
  index.upsert(entry("cmp_b", "Beta"));
  index.last_opened_campaign_id = Some("cmp_a".into());
  s.save_index(index).await.unwrap();

  let mut smaller = CampaignIndex::default();
  smaller.upsert(entry("cmp_b", "Beta"));
  s.save_index(smaller).await.unwrap();

  let loaded = s.load_index().await.unwrap();
  assert_eq!(loaded.campaigns.len(), 1);
  assert_eq!(loaded.campaigns[0].campaign_id, "cmp_b");
  assert!(loaded.last_opened_campaign_id.is_none());
}

// ─── Campaigns ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn campaign_round_trip_with_checksum() {
  let s = store().await;
  let saved = s.save_campaign("cmp_a", payload("cmp_a", "Alpha")).await.unwrap();
  assert_eq!(saved.checksum.algo, CHECKSUM_ALGO);
  assert_eq!(
    saved.checksum.value,
    checksum(&serde_json::to_string(&payload("cmp_a", "Alpha")).unwrap())
  );

  let loaded = s.load_campaign("cmp_a").await.unwrap().unwrap();
  assert!(loaded.checksum_matches);
  assert_eq!(loaded.payload, payload("cmp_a", "Alpha"));
  assert_eq!(loaded.checksum, saved.checksum);
  assert_eq!(loaded.saved_at, saved.saved_at);
  assert_eq!(loaded.schema_version, CURRENT_SCHEMA_VERSION);
}

#[tokio::test]
async fn missing_campaign_is_none() {
  let s = store().await;
  assert!(s.load_campaign("cmp_nope").await.unwrap().is_none());
}

#[tokio::test]
async fn save_overwrites_previous_copy() {
  let s = store().await;
  s.save_campaign("cmp_a", payload("cmp_a", "Alpha")).await.unwrap();
  s.save_campaign("cmp_a", payload("cmp_a", "Renamed")).await.unwrap();

  let loaded = s.load_campaign("cmp_a").await.unwrap().unwrap();
  assert_eq!(loaded.payload.campaign.name, "Renamed");
  assert!(loaded.checksum_matches);
}

#[tokio::test]
async fn tampered_payload_is_flagged() {
  let s = store().await;
  s.save_campaign("cmp_a", payload("cmp_a", "Alpha")).await.unwrap();
  s.execute_raw(
    "UPDATE campaigns SET payload_json = replace(payload_json, 'Ameiko', 'Nualia')",
  )
  .await
  .unwrap();

  let loaded = s.load_campaign("cmp_a").await.unwrap().unwrap();
  assert!(!loaded.checksum_matches);
  assert_eq!(loaded.payload.npcs["npc_1"].field_str("name"), Some("Nualia"));
}

#[tokio::test]
async fn delete_removes_campaign_and_tolerates_unknown_ids() {
  let s = store().await;
  s.save_campaign("cmp_a", payload("cmp_a", "Alpha")).await.unwrap();
  s.save_campaign("cmp_b", payload("cmp_b", "Beta")).await.unwrap();

  s.delete_campaign("cmp_a").await.unwrap();
  s.delete_campaign("cmp_unknown").await.unwrap();

  assert!(s.load_campaign("cmp_a").await.unwrap().is_none());
  assert!(s.load_campaign("cmp_b").await.unwrap().is_some());
}
