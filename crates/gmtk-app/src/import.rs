//! Backup import: validation, migration, fixture replacement, dry run, merge
//! or copy, and the post-import export offer.
//!
//! ```text
//! parse ─► migration check ─► fixture? ──yes──► confirm ─► replace fixture
//!                                 │
//!                                 no
//!                                 ▼
//!                             dry run ─► choose ─┬─ merge ─► resolve conflicts ─► apply
//!                                                ├─ copy  ─► remap IDs ─► save
//!                                                └─ cancel
//! ```
//!
//! Every decision is delegated to an [`ImportPrompter`]. Nothing is written
//! until the user has made all of them, so a cancelled or failed import
//! leaves storage untouched.

use gmtk_core::{
  backup::BackupDocument,
  collection::Collection,
  conflict::{ConflictRecord, DEFAULT_DUPLICATE_SUFFIX, Resolution, resolve_conflicts},
  ids::CAMPAIGN_PREFIX,
  merge::{OrphanedReference, apply_resolutions, detect_conflicts, remap_ids_for_copy},
  payload::CampaignPayload,
  store::{CampaignStorage, IndexEntry},
  timestamp,
};
use serde::Serialize;
use strum::IntoEnumIterator;
use tracing::{debug, info, warn};

use crate::{
  CampaignStore, Error, Result,
  export::{Export, export_campaign},
  migration::{Migrator, SchemaMigrator},
};

// ─── Prompting ───────────────────────────────────────────────────────────────

/// What to do with a backup once the dry run has been shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportAction {
  /// Merge into the campaign with the same ID. Only meaningful when
  /// [`DryRunSummary::can_merge`] is set; otherwise treated as
  /// [`ImportAction::NewCopy`].
  Merge,
  NewCopy,
  Cancel,
}

/// The user's answer to a list of conflicts.
#[derive(Debug, Clone, PartialEq)]
pub enum ConflictChoice {
  /// One strategy for every conflict.
  All(Resolution),
  /// The conflicts with individual resolutions filled in. Records left
  /// without one are duplicated.
  Each(Vec<ConflictRecord>),
}

/// The interactive side of an import.
pub trait ImportPrompter {
  /// The backup predates the current schema. `false` aborts the import.
  fn confirm_migration(&mut self, incoming_version: u32, current_version: u32) -> bool;

  /// The backup is a fixture and will replace stored fixtures with the same
  /// fixture ID. `false` aborts the import.
  fn confirm_fixture_replace(&mut self, backup: &BackupDocument) -> bool;

  fn choose_action(&mut self, summary: &DryRunSummary) -> ImportAction;

  /// `None` cancels the import.
  fn resolve_conflicts(&mut self, conflicts: &[ConflictRecord]) -> Option<ConflictChoice>;

  /// Offered after a successful merge or copy; `true` exports the result.
  fn offer_export(&mut self, campaign_id: &str) -> bool;
}

// ─── Results ─────────────────────────────────────────────────────────────────

/// What importing a backup would do, computed without writing anything.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DryRunSummary {
  pub campaign_id:    String,
  /// Campaign name, or ID when unnamed.
  pub campaign_label: String,
  pub schema_version: u32,
  /// Whether the index already holds a campaign with this ID.
  pub can_merge:      bool,
  /// Incoming entities whose ID the target does not have.
  pub new_count:      usize,
  /// Incoming entities whose ID the target has with a different value.
  pub update_count:   usize,
  /// One record per update, tagged with its collection.
  pub conflicts:      Vec<ConflictRecord>,
}

#[derive(Debug)]
pub enum ImportOutcome {
  Merged {
    campaign_id: String,
    conflicts:   usize,
    backup:      Option<Export>,
  },
  Copied {
    campaign_id:         String,
    orphaned_references: Vec<OrphanedReference>,
    backup:              Option<Export>,
  },
  FixtureReplaced {
    campaign_id: String,
    /// Campaign IDs of the fixtures dropped from the index.
    replaced:    Vec<String>,
  },
  Cancelled,
  MigrationDeclined {
    incoming_version: u32,
  },
}

// ─── Importer ────────────────────────────────────────────────────────────────

pub struct Importer<M = SchemaMigrator> {
  migrator:         M,
  duplicate_suffix: String,
}

impl Default for Importer {
  fn default() -> Self { Self::new(SchemaMigrator) }
}

impl<M: Migrator> Importer<M> {
  pub fn new(migrator: M) -> Self {
    Self { migrator, duplicate_suffix: DEFAULT_DUPLICATE_SUFFIX.to_owned() }
  }

  /// Suffix appended to the names of duplicated entities.
  pub fn with_duplicate_suffix(mut self, suffix: impl Into<String>) -> Self {
    self.duplicate_suffix = suffix.into();
    self
  }

  /// Parse `text` as a backup and import it.
  pub async fn import_text<S, P>(
    &self,
    store: &mut CampaignStore<S>,
    prompter: &mut P,
    text: &str,
  ) -> Result<ImportOutcome>
  where
    S: CampaignStorage,
    P: ImportPrompter,
  {
    let backup = BackupDocument::parse(text)?;
    self.import(store, prompter, backup).await
  }

  pub async fn import<S, P>(
    &self,
    store: &mut CampaignStore<S>,
    prompter: &mut P,
    mut backup: BackupDocument,
  ) -> Result<ImportOutcome>
  where
    S: CampaignStorage,
    P: ImportPrompter,
  {
    let incoming_version = backup.schema_version;
    if self.migrator.needs_migration(incoming_version) {
      let current = self.migrator.current_version();
      if !prompter.confirm_migration(incoming_version, current) {
        info!(incoming_version, "import declined at migration");
        return Ok(ImportOutcome::MigrationDeclined { incoming_version });
      }
      backup.payload = self.migrator.migrate_payload(incoming_version, backup.payload);
      backup.schema_version = current;
    }

    if backup.is_fixture {
      return self.import_fixture(store, prompter, backup).await;
    }

    let summary = self.dry_run(store, &backup).await?;
    let action = match prompter.choose_action(&summary) {
      ImportAction::Merge if !summary.can_merge => ImportAction::NewCopy,
      action => action,
    };

    let outcome = match action {
      ImportAction::Cancel => return Ok(ImportOutcome::Cancelled),
      ImportAction::NewCopy => self.import_copy(store, &backup.payload).await?,
      ImportAction::Merge => {
        let resolutions = if summary.conflicts.is_empty() {
          Vec::new()
        } else {
          match prompter.resolve_conflicts(&summary.conflicts) {
            None => return Ok(ImportOutcome::Cancelled),
            Some(ConflictChoice::All(strategy)) => resolve_conflicts(
              &summary.conflicts,
              Some(strategy),
              &self.duplicate_suffix,
              store.ids(),
            ),
            Some(ConflictChoice::Each(records)) => {
              resolve_conflicts(&records, None, &self.duplicate_suffix, store.ids())
            }
          }
        };
        self.apply_merge(store, &backup, &resolutions).await?
      }
    };

    Ok(match outcome {
      ImportOutcome::Merged { campaign_id, conflicts, .. } => ImportOutcome::Merged {
        backup: offer_export(store, prompter, &campaign_id).await?,
        campaign_id,
        conflicts,
      },
      ImportOutcome::Copied { campaign_id, orphaned_references, .. } => ImportOutcome::Copied {
        backup: offer_export(store, prompter, &campaign_id).await?,
        campaign_id,
        orphaned_references,
      },
      other => other,
    })
  }

  /// Compare `backup` against the stored campaign with the same ID.
  pub async fn dry_run<S: CampaignStorage>(
    &self,
    store: &CampaignStore<S>,
    backup: &BackupDocument,
  ) -> Result<DryRunSummary> {
    let index = store.load_index().await?;
    let mut summary = DryRunSummary {
      campaign_id: backup.campaign_id.clone(),
      campaign_label: backup.label().to_owned(),
      schema_version: backup.schema_version,
      can_merge: index.entry(&backup.campaign_id).is_some(),
      ..DryRunSummary::default()
    };

    if !summary.can_merge {
      summary.new_count = backup.payload.entity_count();
      return Ok(summary);
    }

    let existing = store.payload_for(&backup.campaign_id).await?;
    let empty = CampaignPayload::default();
    let existing = existing.as_deref().unwrap_or(&empty);

    for collection in Collection::iter() {
      let incoming = backup.payload.collection(collection);
      let current = existing.collection(collection);
      summary.new_count += incoming.keys().filter(|id| !current.contains_key(*id)).count();
      for mut conflict in detect_conflicts(current, incoming) {
        conflict.collection = Some(collection);
        summary.conflicts.push(conflict);
      }
    }
    summary.update_count = summary.conflicts.len();
    Ok(summary)
  }

  // ── Merge ─────────────────────────────────────────────────────────────────

  async fn apply_merge<S: CampaignStorage>(
    &self,
    store: &mut CampaignStore<S>,
    backup: &BackupDocument,
    resolutions: &[ConflictRecord],
  ) -> Result<ImportOutcome> {
    let campaign_id = backup.campaign_id.as_str();
    let Some(existing) = store.payload_for(campaign_id).await? else {
      warn!(campaign_id, "merge target is gone; importing as a new copy");
      return self.import_copy(store, &backup.payload).await;
    };

    let incoming = &backup.payload;
    let mut merged = existing.with_campaign(existing.campaign.overlay(&incoming.campaign)?);
    for collection in Collection::iter() {
      let incoming_map = incoming.collection(collection);
      let for_collection: Vec<ConflictRecord> = resolutions
        .iter()
        .filter(|c| match c.collection {
          Some(tagged) => tagged == collection,
          None => incoming_map.contains_key(&c.id),
        })
        .cloned()
        .collect();
      let result = apply_resolutions(
        existing.collection(collection),
        incoming_map.values(),
        &for_collection,
        store.ids(),
      );
      debug!(
        %collection,
        before = existing.collection(collection).len(),
        after = result.len(),
        conflicts = for_collection.len(),
        "collection merged"
      );
      *merged.collection_mut(collection) = result;
    }

    store
      .storage()
      .save_campaign(campaign_id, merged.clone())
      .await
      .map_err(Error::storage)?;
    let mut index = store.load_index().await?;
    if let Some(entry) = index.entry_mut(campaign_id) {
      entry.name = merged.campaign.name.clone();
      entry.adventure_path = merged.campaign.adventure_path.clone();
      entry.updated_at = Some(timestamp::now_iso());
    }
    store.save_index(index).await?;
    store.load_campaign(campaign_id).await?;

    info!(campaign_id, conflicts = resolutions.len(), "import merged into existing campaign");
    Ok(ImportOutcome::Merged {
      campaign_id: campaign_id.to_owned(),
      conflicts:   resolutions.len(),
      backup:      None,
    })
  }

  // ── Copy ──────────────────────────────────────────────────────────────────

  async fn import_copy<S: CampaignStorage>(
    &self,
    store: &mut CampaignStore<S>,
    payload: &CampaignPayload,
  ) -> Result<ImportOutcome> {
    let copy = remap_ids_for_copy(payload, store.ids());
    for orphan in &copy.orphaned_references {
      warn!(
        collection = %orphan.collection,
        entity_id = %orphan.entity_id,
        field = %orphan.field,
        ref_id = %orphan.ref_id,
        "reference has no counterpart in the imported campaign"
      );
    }
    if !copy.payload.session_reviews.is_empty() {
      debug!("session review references keep their original IDs");
    }

    let campaign_id = copy.new_campaign_id;
    store
      .storage()
      .save_campaign(&campaign_id, copy.payload.clone())
      .await
      .map_err(Error::storage)?;
    let mut index = store.load_index().await?;
    index.upsert(IndexEntry {
      updated_at: Some(timestamp::now_iso()),
      ..IndexEntry::for_payload(&copy.payload)
    });
    index.last_opened_campaign_id = Some(campaign_id.clone());
    store.save_index(index).await?;
    store.load_campaign(&campaign_id).await?;

    info!(campaign_id = %campaign_id, "import complete as new campaign");
    Ok(ImportOutcome::Copied {
      campaign_id,
      orphaned_references: copy.orphaned_references,
      backup: None,
    })
  }

  // ── Fixture ───────────────────────────────────────────────────────────────

  async fn import_fixture<S, P>(
    &self,
    store: &mut CampaignStore<S>,
    prompter: &mut P,
    backup: BackupDocument,
  ) -> Result<ImportOutcome>
  where
    S: CampaignStorage,
    P: ImportPrompter,
  {
    if !prompter.confirm_fixture_replace(&backup) {
      return Ok(ImportOutcome::Cancelled);
    }

    let BackupDocument { mut payload, fixture_id, fixture_label, fixture_version, .. } = backup;
    let mut campaign_id = payload.campaign.id.clone();
    payload.campaign.is_fixture = true;
    payload.campaign.fixture_id = fixture_id.clone();
    payload.campaign.fixture_label = fixture_label;
    payload.campaign.fixture_version = fixture_version;

    let mut index = store.load_index().await?;
    let removed = match fixture_id.as_deref() {
      Some(fixture_id) => index.remove_fixtures(fixture_id),
      None => Vec::new(),
    };
    let replaced: Vec<String> = removed.into_iter().map(|e| e.campaign_id).collect();

    // Only fixtures with the same fixture ID may be overwritten. Anything else
    // still holding this campaign ID keeps it, and the fixture moves aside.
    let occupied = index.entry(&campaign_id).is_some()
      || (!replaced.contains(&campaign_id) && store.load_stored(&campaign_id).await?.is_some());
    if occupied {
      let fresh = store.ids().next(CAMPAIGN_PREFIX);
      warn!(
        campaign_id = %campaign_id,
        new_campaign_id = %fresh,
        "fixture campaign ID belongs to another campaign; installing under a new ID"
      );
      campaign_id = fresh;
      payload.campaign.id = campaign_id.clone();
      for collection in Collection::iter() {
        for entity in payload.collection_mut(collection).values_mut() {
          entity.campaign_id = Some(campaign_id.clone());
        }
      }
    }

    let mut entry = IndexEntry::fixture_for_payload(&payload);
    if entry.name.is_empty() {
      entry.name = "Fixture".to_owned();
    }
    entry.updated_at = Some(timestamp::now_iso());

    store
      .storage()
      .save_campaign(&campaign_id, payload)
      .await
      .map_err(Error::storage)?;
    for stale in replaced.iter().filter(|id| **id != campaign_id) {
      store.storage().delete_campaign(stale).await.map_err(Error::storage)?;
    }
    index.upsert(entry);
    index.last_opened_campaign_id = Some(campaign_id.clone());
    store.save_index(index).await?;
    store.load_campaign(&campaign_id).await?;

    info!(campaign_id = %campaign_id, replaced = replaced.len(), "fixture import complete");
    Ok(ImportOutcome::FixtureReplaced { campaign_id, replaced })
  }
}

async fn offer_export<S, P>(
  store: &CampaignStore<S>,
  prompter: &mut P,
  campaign_id: &str,
) -> Result<Option<Export>>
where
  S: CampaignStorage,
  P: ImportPrompter,
{
  if !prompter.offer_export(campaign_id) {
    return Ok(None);
  }
  Ok(Some(export_campaign(store, Some(campaign_id)).await?))
}

