//! Import scenarios against an in-memory SQLite store.

use std::sync::Arc;

use gmtk_core::{
  Error as CoreError,
  backup::BackupDocument,
  collection::Collection,
  conflict::{ConflictRecord, Resolution},
  entity::Entity,
  ids::SequentialIds,
  payload::{CampaignMeta, CampaignPayload},
  store::{CampaignIndex, CampaignStorage, IndexEntry},
};
use gmtk_store_sqlite::SqliteStore;
use serde_json::json;

use crate::{
  CampaignStore, Error,
  import::{ConflictChoice, DryRunSummary, ImportAction, ImportOutcome, ImportPrompter, Importer},
  migration::Migrator,
};

// ─── Harness ─────────────────────────────────────────────────────────────────

async fn store() -> CampaignStore<SqliteStore> {
  let storage = SqliteStore::open_in_memory().await.expect("in-memory store");
  CampaignStore::new(Arc::new(storage), Arc::new(SequentialIds::starting_after(100)))
}

/// Answers every prompt from a script and records what it was shown.
struct Script {
  migrate:         bool,
  replace_fixture: bool,
  action:          ImportAction,
  choice:          Option<ConflictChoice>,
  export:          bool,
  summary:         Option<DryRunSummary>,
  asked_conflicts: Vec<ConflictRecord>,
}

impl Script {
  fn choosing(action: ImportAction) -> Self {
    Self {
      migrate: true,
      replace_fixture: true,
      action,
      choice: Some(ConflictChoice::All(Resolution::Duplicate)),
      export: false,
      summary: None,
      asked_conflicts: Vec::new(),
    }
  }
}

impl ImportPrompter for Script {
  fn confirm_migration(&mut self, _incoming: u32, _current: u32) -> bool { self.migrate }

  fn confirm_fixture_replace(&mut self, _backup: &BackupDocument) -> bool { self.replace_fixture }

  fn choose_action(&mut self, summary: &DryRunSummary) -> ImportAction {
    self.summary = Some(summary.clone());
    self.action
  }

  fn resolve_conflicts(&mut self, conflicts: &[ConflictRecord]) -> Option<ConflictChoice> {
    self.asked_conflicts = conflicts.to_vec();
    self.choice.clone()
  }

  fn offer_export(&mut self, _campaign_id: &str) -> bool { self.export }
}

const T0: &str = "2024-01-01T00:00:00.000Z";
const T1: &str = "2024-02-01T00:00:00.000Z";

fn npc(id: &str, name: &str, updated_at: &str) -> Entity {
  let mut e = Entity::new(id, "cmp_1", T0).with_field("name", name);
  e.updated_at = Some(updated_at.to_owned());
  e
}

fn campaign(name: &str) -> CampaignPayload {
  CampaignPayload::new(CampaignMeta {
    id: "cmp_1".into(),
    name: name.into(),
    ..CampaignMeta::default()
  })
}

/// Store a campaign `cmp_1` with NPCs Bob and Carl and index it.
async fn seed(s: &mut CampaignStore<SqliteStore>) {
  let mut payload = campaign("Runelords");
  for e in [npc("npc_1", "Bob", T0), npc("npc_2", "Carl", T0)] {
    payload.npcs.insert(e.id.clone(), e);
  }
  s.storage().save_campaign("cmp_1", payload.clone()).await.unwrap();
  let mut index = CampaignIndex::default();
  index.upsert(IndexEntry::for_payload(&payload));
  s.save_index(index).await.unwrap();
}

/// A backup of `cmp_1` renaming Bob and adding Dana.
fn incoming() -> BackupDocument {
  let mut payload = campaign("Runelords Revised");
  for e in [npc("npc_1", "Robert", T1), npc("npc_2", "Carl", T0), npc("npc_3", "Dana", T1)] {
    payload.npcs.insert(e.id.clone(), e);
  }
  BackupDocument::new("cmp_1", payload)
}

// ─── Validation ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn invalid_documents_change_nothing() {
  let mut s = store().await;
  seed(&mut s).await;
  let before = s.load_index().await.unwrap();
  let importer = Importer::default();
  let mut script = Script::choosing(ImportAction::NewCopy);

  let cases = [
    ("not json", "invalid"),
    (r#"{"payload": {}}"#, "fields"),
    (r#"{"schemaVersion": 1, "payload": {"campaign": {}}}"#, "id"),
  ];
  for (text, expected) in cases {
    let err = importer.import_text(&mut s, &mut script, text).await.unwrap_err();
    let ok = match expected {
      "invalid" => matches!(err, Error::Core(CoreError::InvalidDocument(_))),
      "fields" => matches!(err, Error::Core(CoreError::MissingFields)),
      _ => matches!(err, Error::Core(CoreError::MissingCampaignId)),
    };
    assert!(ok, "{text}: {err}");
  }

  assert_eq!(s.load_index().await.unwrap(), before);
  assert!(script.summary.is_none());
}

// ─── Dry run ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn dry_run_counts_against_target() {
  let mut s = store().await;
  seed(&mut s).await;

  let summary = Importer::default().dry_run(&s, &incoming()).await.unwrap();
  assert!(summary.can_merge);
  assert_eq!(summary.new_count, 1);
  assert_eq!(summary.update_count, 1);
  assert_eq!(summary.conflicts.len(), 1);
  assert_eq!(summary.conflicts[0].id, "npc_1");
  assert_eq!(summary.conflicts[0].collection, Some(Collection::Npcs));
  assert_eq!(summary.campaign_label, "Runelords Revised");
}

#[tokio::test]
async fn dry_run_without_target_counts_everything_new() {
  let s = store().await;
  let summary = Importer::default().dry_run(&s, &incoming()).await.unwrap();
  assert!(!summary.can_merge);
  assert_eq!(summary.new_count, 3);
  assert!(summary.conflicts.is_empty());
}

// ─── Merge ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn merge_with_bulk_incoming() {
  let mut s = store().await;
  seed(&mut s).await;
  let mut script = Script::choosing(ImportAction::Merge);
  script.choice = Some(ConflictChoice::All(Resolution::Incoming));

  let outcome = Importer::default().import(&mut s, &mut script, incoming()).await.unwrap();
  let ImportOutcome::Merged { campaign_id, conflicts, backup } = outcome else {
    panic!("expected a merge, got {outcome:?}");
  };
  assert_eq!(campaign_id, "cmp_1");
  assert_eq!(conflicts, 1);
  assert!(backup.is_none());
  assert_eq!(script.asked_conflicts.len(), 1);

  let current = s.current_campaign().unwrap();
  assert_eq!(s.current_campaign_id(), Some("cmp_1"));
  assert_eq!(current.campaign.id, "cmp_1");
  assert_eq!(current.campaign.name, "Runelords Revised");
  assert_eq!(current.npcs.len(), 3);
  assert_eq!(current.npcs["npc_1"].field_str("name"), Some("Robert"));

  let index = s.load_index().await.unwrap();
  assert_eq!(index.campaigns.len(), 1);
  assert_eq!(index.campaigns[0].name, "Runelords Revised");
  assert_eq!(index.last_opened_campaign_id.as_deref(), Some("cmp_1"));
}

#[tokio::test]
async fn merge_touches_only_changed_collections() {
  let mut s = store().await;

  let bob = npc("npc_1", "Bob", T0).with_field("notes", "Innkeeper");
  let goblin = Entity::new("crt_1", "cmp_1", T0).with_field("name", "Goblin");
  let ambush = Entity::new("enc_1", "cmp_1", T0)
    .with_field("title", "Ambush")
    .with_field("participants", json!([{ "type": "npc", "refId": "npc_1", "quantity": 1 }]));
  let opening = Entity::new("ses_1", "cmp_1", T0)
    .with_field("title", "Session 1")
    .with_field("encounterIds", json!(["enc_1"]));
  let tavern = Entity::new("loc_1", "cmp_1", T0).with_field("name", "Rusty Dragon");

  let mut existing = campaign("Runelords");
  existing.npcs.insert(bob.id.clone(), bob.clone());
  existing.creatures.insert(goblin.id.clone(), goblin.clone());
  existing.encounters.insert(ambush.id.clone(), ambush.clone());
  existing.sessions.insert(opening.id.clone(), opening.clone());
  existing.locations.insert(tavern.id.clone(), tavern);
  s.storage().save_campaign("cmp_1", existing.clone()).await.unwrap();
  let mut index = CampaignIndex::default();
  index.upsert(IndexEntry::for_payload(&existing));
  s.save_index(index).await.unwrap();

  // Locations are left out of the backup entirely.
  let mut backup = campaign("Runelords");
  let mut changed = bob.clone().with_field("notes", "Owns the Rusty Dragon");
  changed.updated_at = Some(T1.to_owned());
  let ogre = Entity::new("crt_2", "cmp_1", T1).with_field("name", "Ogre");
  backup.npcs.insert(changed.id.clone(), changed);
  backup.creatures.insert(goblin.id.clone(), goblin.clone());
  backup.creatures.insert(ogre.id.clone(), ogre.clone());
  backup.encounters.insert(ambush.id.clone(), ambush);
  backup.sessions.insert(opening.id.clone(), opening);
  let backup = BackupDocument::new("cmp_1", backup);

  let summary = Importer::default().dry_run(&s, &backup).await.unwrap();
  assert_eq!(summary.new_count, 1);
  assert_eq!(summary.update_count, 1);
  assert_eq!(summary.conflicts.len(), 1);
  assert_eq!(summary.conflicts[0].id, "npc_1");
  assert_eq!(summary.conflicts[0].existing.field_str("notes"), Some("Innkeeper"));

  let mut script = Script::choosing(ImportAction::Merge);
  script.choice = Some(ConflictChoice::All(Resolution::Incoming));
  let outcome = Importer::default().import(&mut s, &mut script, backup).await.unwrap();
  assert!(matches!(outcome, ImportOutcome::Merged { conflicts: 1, .. }));

  let merged = s.load_stored("cmp_1").await.unwrap().unwrap();
  assert_eq!(merged.npcs.len(), 1);
  assert_eq!(merged.npcs["npc_1"].field_str("notes"), Some("Owns the Rusty Dragon"));
  assert_eq!(merged.creatures.len(), 2);
  assert_eq!(merged.creatures["crt_1"], goblin);
  assert_eq!(merged.creatures["crt_2"], ogre);

  for collection in [
    Collection::Party,
    Collection::Encounters,
    Collection::Locations,
    Collection::Items,
    Collection::Sessions,
    Collection::SessionReviews,
  ] {
    assert_eq!(
      json!(merged.collection(collection)),
      json!(existing.collection(collection)),
      "{collection} changed"
    );
  }
}

#[tokio::test]
async fn unanswered_conflicts_are_duplicated() {
  let mut s = store().await;
  seed(&mut s).await;

  // Echo the conflicts back without choosing a resolution for any of them.
  let summary = Importer::default().dry_run(&s, &incoming()).await.unwrap();
  let mut script = Script::choosing(ImportAction::Merge);
  script.choice = Some(ConflictChoice::Each(summary.conflicts));

  Importer::default()
    .with_duplicate_suffix("(Copy)")
    .import(&mut s, &mut script, incoming())
    .await
    .unwrap();

  let current = s.current_campaign().unwrap();
  assert_eq!(current.npcs.len(), 4);
  assert_eq!(current.npcs["npc_1"].field_str("name"), Some("Bob"));
  assert_eq!(current.npcs["npc_3"].field_str("name"), Some("Dana"));
  let copy = current
    .npcs
    .values()
    .find(|e| e.field_str("name") == Some("Robert (Copy)"))
    .expect("duplicate");
  assert!(copy.id.starts_with("npc_"));
  assert_ne!(copy.id, "npc_1");
}

#[tokio::test]
async fn most_recent_prefers_newer_incoming() {
  let mut s = store().await;
  seed(&mut s).await;

  let mut script = Script::choosing(ImportAction::Merge);
  script.choice = Some(ConflictChoice::All(Resolution::MostRecent));
  Importer::default().import(&mut s, &mut script, incoming()).await.unwrap();

  let current = s.current_campaign().unwrap();
  assert_eq!(current.npcs["npc_1"].field_str("name"), Some("Robert"));
  assert_eq!(current.npcs.len(), 3);
}

#[tokio::test]
async fn cancelling_conflict_resolution_writes_nothing() {
  let mut s = store().await;
  seed(&mut s).await;
  let before = s.load_stored("cmp_1").await.unwrap();
  let mut script = Script::choosing(ImportAction::Merge);
  script.choice = None;

  let outcome = Importer::default().import(&mut s, &mut script, incoming()).await.unwrap();
  assert!(matches!(outcome, ImportOutcome::Cancelled));
  assert_eq!(s.load_stored("cmp_1").await.unwrap(), before);
  assert!(s.current_campaign().is_none());
}

#[tokio::test]
async fn vanished_merge_target_falls_back_to_copy() {
  let mut s = store().await;
  seed(&mut s).await;
  s.storage().delete_campaign("cmp_1").await.unwrap();

  let mut script = Script::choosing(ImportAction::Merge);
  let outcome = Importer::default().import(&mut s, &mut script, incoming()).await.unwrap();
  let ImportOutcome::Copied { campaign_id, .. } = outcome else {
    panic!("expected a copy, got {outcome:?}");
  };
  assert_ne!(campaign_id, "cmp_1");
  assert_eq!(s.current_campaign().unwrap().npcs.len(), 3);
}

// ─── Copy ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn copy_import_creates_independent_campaign() {
  let mut s = store().await;
  seed(&mut s).await;

  let mut backup = incoming();
  backup.payload.encounters.insert(
    "enc_1".into(),
    Entity::new("enc_1", "cmp_1", T0).with_field(
      "participants",
      json!([
        { "type": "npc", "refId": "npc_3", "quantity": 1 },
        { "type": "creature", "refId": "crt_gone", "quantity": 2 },
      ]),
    ),
  );

  let mut script = Script::choosing(ImportAction::NewCopy);
  script.export = true;
  let outcome = Importer::default().import(&mut s, &mut script, backup).await.unwrap();
  let ImportOutcome::Copied { campaign_id, orphaned_references, backup } = outcome else {
    panic!("expected a copy, got {outcome:?}");
  };

  assert_eq!(orphaned_references.len(), 1);
  assert_eq!(orphaned_references[0].ref_id, "crt_gone");
  let export = backup.expect("export offered and accepted");
  assert_eq!(export.document.campaign_id, campaign_id);
  assert_eq!(export.file_name, "gmtoolkit-Runelords Revised (Imported).json");

  let current = s.current_campaign().unwrap();
  assert_eq!(current.campaign.id, campaign_id);
  assert!(current.npcs.keys().all(|id| !["npc_1", "npc_2", "npc_3"].contains(&id.as_str())));

  let dana = current.npcs.values().find(|e| e.field_str("name") == Some("Dana")).unwrap();
  let encounter = current.encounters.values().next().unwrap();
  assert_eq!(encounter.field("participants").unwrap()[0]["refId"], json!(dana.id));

  let original = s.load_stored("cmp_1").await.unwrap().unwrap();
  assert_eq!(original.npcs["npc_1"].field_str("name"), Some("Bob"));

  let index = s.load_index().await.unwrap();
  assert_eq!(index.campaigns.len(), 2);
  let entry = index.entry(&campaign_id).unwrap();
  assert!(!entry.is_fixture);
  assert_eq!(index.last_opened_campaign_id.as_deref(), Some(campaign_id.as_str()));
}

#[tokio::test]
async fn merge_choice_without_target_becomes_copy() {
  let mut s = store().await;
  let mut script = Script::choosing(ImportAction::Merge);
  let outcome = Importer::default().import(&mut s, &mut script, incoming()).await.unwrap();
  assert!(matches!(outcome, ImportOutcome::Copied { .. }));
  assert!(!script.summary.unwrap().can_merge);
}

#[tokio::test]
async fn cancel_at_decision_writes_nothing() {
  let mut s = store().await;
  let mut script = Script::choosing(ImportAction::Cancel);
  let outcome = Importer::default().import(&mut s, &mut script, incoming()).await.unwrap();
  assert!(matches!(outcome, ImportOutcome::Cancelled));
  assert!(s.load_index().await.unwrap().campaigns.is_empty());
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn fixture_entry(campaign_id: &str, fixture_id: &str) -> IndexEntry {
  IndexEntry {
    campaign_id:     campaign_id.into(),
    name:            format!("Fixture {campaign_id}"),
    adventure_path:  None,
    updated_at:      None,
    is_fixture:      true,
    fixture_id:      Some(fixture_id.into()),
    fixture_label:   None,
    fixture_version: None,
  }
}

#[tokio::test]
async fn fixture_import_replaces_only_matching_fixtures() {
  let mut s = store().await;
  seed(&mut s).await;
  s.storage().save_campaign("cmp_old", campaign("Old demo")).await.unwrap();
  let mut index = s.load_index().await.unwrap();
  index.upsert(fixture_entry("cmp_old", "demo"));
  index.upsert(fixture_entry("cmp_other", "other"));
  s.save_index(index).await.unwrap();

  let mut payload = campaign("Demo");
  payload.campaign.id = "cmp_demo".into();
  let mut backup = BackupDocument::new("cmp_demo", payload);
  backup.is_fixture = true;
  backup.fixture_id = Some("demo".into());
  backup.fixture_label = Some("Demo data".into());
  backup.fixture_version = Some(json!(2));

  let mut script = Script::choosing(ImportAction::Cancel);
  let outcome = Importer::default().import(&mut s, &mut script, backup).await.unwrap();
  let ImportOutcome::FixtureReplaced { campaign_id, replaced } = outcome else {
    panic!("expected a fixture import, got {outcome:?}");
  };
  assert_eq!(campaign_id, "cmp_demo");
  assert_eq!(replaced, vec!["cmp_old".to_owned()]);
  assert!(script.summary.is_none());

  let index = s.load_index().await.unwrap();
  let ids: Vec<&str> = index.campaigns.iter().map(|e| e.campaign_id.as_str()).collect();
  assert_eq!(ids, ["cmp_1", "cmp_other", "cmp_demo"]);
  let entry = index.entry("cmp_demo").unwrap();
  assert!(entry.is_fixture);
  assert_eq!(entry.fixture_label.as_deref(), Some("Demo data"));
  assert_eq!(index.last_opened_campaign_id.as_deref(), Some("cmp_demo"));

  let current = s.current_campaign().unwrap();
  assert!(current.campaign.is_fixture);
  assert_eq!(current.campaign.fixture_version, Some(json!(2)));
  assert!(s.load_stored("cmp_old").await.unwrap().is_none());
  assert!(s.load_stored("cmp_1").await.unwrap().is_some());
}

#[tokio::test]
async fn declined_fixture_import_is_cancelled() {
  let mut s = store().await;
  let mut backup = incoming();
  backup.is_fixture = true;
  backup.fixture_id = Some("demo".into());

  let mut script = Script::choosing(ImportAction::NewCopy);
  script.replace_fixture = false;
  let outcome = Importer::default().import(&mut s, &mut script, backup).await.unwrap();
  assert!(matches!(outcome, ImportOutcome::Cancelled));
  assert!(s.load_index().await.unwrap().campaigns.is_empty());
}

#[tokio::test]
async fn fixture_never_overwrites_a_real_campaign() {
  let mut s = store().await;
  seed(&mut s).await;

  let mut payload = campaign("Demo");
  payload.npcs.insert("npc_9".into(), npc("npc_9", "Demo NPC", T0));
  let mut backup = BackupDocument::new("cmp_1", payload);
  backup.is_fixture = true;
  backup.fixture_id = Some("demo".into());

  let mut script = Script::choosing(ImportAction::Cancel);
  let outcome = Importer::default().import(&mut s, &mut script, backup).await.unwrap();
  let ImportOutcome::FixtureReplaced { campaign_id, replaced } = outcome else {
    panic!("expected a fixture import, got {outcome:?}");
  };
  assert_eq!(campaign_id, "cmp_101");
  assert!(replaced.is_empty());

  let real = s.load_stored("cmp_1").await.unwrap().unwrap();
  assert_eq!(real.campaign.name, "Runelords");
  assert_eq!(real.npcs.len(), 2);
  assert!(!real.campaign.is_fixture);

  let index = s.load_index().await.unwrap();
  assert!(!index.entry("cmp_1").unwrap().is_fixture);
  assert!(index.entry("cmp_101").unwrap().is_fixture);

  let current = s.current_campaign().unwrap();
  assert_eq!(current.campaign.id, "cmp_101");
  assert_eq!(current.npcs["npc_9"].campaign_id.as_deref(), Some("cmp_101"));
}

#[tokio::test]
async fn fixture_reimport_keeps_its_campaign_id() {
  let mut s = store().await;

  let fixture = || {
    let mut payload = campaign("Demo");
    payload.campaign.id = "cmp_demo".into();
    let mut backup = BackupDocument::new("cmp_demo", payload);
    backup.is_fixture = true;
    backup.fixture_id = Some("demo".into());
    backup
  };

  let mut script = Script::choosing(ImportAction::Cancel);
  Importer::default().import(&mut s, &mut script, fixture()).await.unwrap();
  let outcome = Importer::default().import(&mut s, &mut script, fixture()).await.unwrap();
  let ImportOutcome::FixtureReplaced { campaign_id, replaced } = outcome else {
    panic!("expected a fixture import, got {outcome:?}");
  };
  assert_eq!(campaign_id, "cmp_demo");
  assert_eq!(replaced, vec!["cmp_demo".to_owned()]);
  assert!(s.load_stored("cmp_demo").await.unwrap().is_some());
  assert_eq!(s.load_index().await.unwrap().campaigns.len(), 1);
}

// ─── Migration ───────────────────────────────────────────────────────────────

/// Pretends the current schema is 2 and tags migrated payloads.
struct SchemaTwo;

impl Migrator for SchemaTwo {
  fn current_version(&self) -> u32 { 2 }

  fn migrate_payload(&self, _version: u32, mut payload: CampaignPayload) -> CampaignPayload {
    payload.campaign.extra.insert("migrated".into(), json!(true));
    payload
  }
}

#[tokio::test]
async fn declined_migration_stops_import() {
  let mut s = store().await;
  let mut script = Script::choosing(ImportAction::NewCopy);
  script.migrate = false;

  let outcome = Importer::new(SchemaTwo).import(&mut s, &mut script, incoming()).await.unwrap();
  assert!(matches!(outcome, ImportOutcome::MigrationDeclined { incoming_version: 1 }));
  assert!(s.load_index().await.unwrap().campaigns.is_empty());
}

#[tokio::test]
async fn accepted_migration_is_applied() {
  let mut s = store().await;
  let mut script = Script::choosing(ImportAction::NewCopy);

  Importer::new(SchemaTwo).import(&mut s, &mut script, incoming()).await.unwrap();
  assert_eq!(script.summary.unwrap().schema_version, 2);
  assert_eq!(s.current_campaign().unwrap().campaign.extra["migrated"], json!(true));
}
