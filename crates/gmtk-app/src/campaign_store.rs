//! The campaign store: the currently loaded campaign and the operations that
//! edit and persist it.
//!
//! The loaded payload is held as an `Arc` snapshot. Every edit builds a new
//! payload and swaps it in, so a snapshot handed out earlier never changes.

use std::sync::Arc;

use gmtk_core::{
  collection::Collection,
  entity::{ENVELOPE_KEYS, Entity},
  ids::{CAMPAIGN_PREFIX, IdGenerator},
  passphrase::{self, GeneratedPassphrase},
  payload::{CampaignMeta, CampaignPayload, DEFAULT_PARTY_SIZE_FOR_XP_SPLIT},
  search::SearchIndex,
  store::{CampaignIndex, CampaignStorage, IndexEntry},
  tags::normalize_tags,
  timestamp,
};
use rand_core::RngCore;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// Input for [`CampaignStore::create_campaign`].
#[derive(Debug, Clone, Default)]
pub struct NewCampaign {
  pub name:           String,
  pub adventure_path: Option<String>,
  pub notes:          Option<String>,
  pub tags:           Vec<String>,
}

pub struct CampaignStore<S> {
  storage: Arc<S>,
  ids:     Arc<dyn IdGenerator>,
  current: Option<Arc<CampaignPayload>>,
}

impl<S: CampaignStorage> CampaignStore<S> {
  pub fn new(storage: Arc<S>, ids: Arc<dyn IdGenerator>) -> Self {
    Self { storage, ids, current: None }
  }

  pub fn storage(&self) -> &S { &self.storage }

  pub fn ids(&self) -> &dyn IdGenerator { self.ids.as_ref() }

  pub fn current_campaign_id(&self) -> Option<&str> {
    self.current.as_deref().map(|p| p.campaign.id.as_str())
  }

  pub fn current_campaign(&self) -> Option<Arc<CampaignPayload>> { self.current.clone() }

  /// A search index over the loaded campaign.
  pub fn search_index(&self) -> Option<SearchIndex> {
    self.current.as_deref().map(SearchIndex::build)
  }

  // ── Storage passthrough ───────────────────────────────────────────────────

  pub async fn load_index(&self) -> Result<CampaignIndex> {
    self.storage.load_index().await.map_err(Error::storage)
  }

  pub async fn save_index(&self, index: CampaignIndex) -> Result<()> {
    self.storage.save_index(index).await.map_err(Error::storage)
  }

  /// The stored payload for `campaign_id`, without loading it.
  pub async fn load_stored(&self, campaign_id: &str) -> Result<Option<CampaignPayload>> {
    let stored = self
      .storage
      .load_campaign(campaign_id)
      .await
      .map_err(Error::storage)?;
    Ok(stored.map(|s| {
      if !s.checksum_matches {
        warn!(campaign_id, "checksum mismatch; export a backup soon");
      }
      s.payload
    }))
  }

  /// `campaign_id`'s payload: the loaded snapshot if it is the current
  /// campaign, else whatever storage holds.
  pub async fn payload_for(&self, campaign_id: &str) -> Result<Option<Arc<CampaignPayload>>> {
    if self.current_campaign_id() == Some(campaign_id) {
      return Ok(self.current.clone());
    }
    Ok(self.load_stored(campaign_id).await?.map(Arc::new))
  }

  // ── Campaign lifecycle ────────────────────────────────────────────────────

  /// Create, save, index and load a new empty campaign. Returns its ID.
  pub async fn create_campaign(&mut self, input: NewCampaign) -> Result<String> {
    let id = self.ids.next(CAMPAIGN_PREFIX);
    let now = timestamp::now_iso();

    let mut extra = Map::new();
    extra.insert("partySizeForXpSplit".into(), Value::from(DEFAULT_PARTY_SIZE_FOR_XP_SPLIT));
    let payload = CampaignPayload::new(CampaignMeta {
      id: id.clone(),
      name: input.name,
      adventure_path: input.adventure_path,
      notes: input.notes,
      tags: normalize_tags(&input.tags),
      created_at: Some(now.clone()),
      updated_at: Some(now),
      extra,
      ..CampaignMeta::default()
    });

    self.storage.save_campaign(&id, payload.clone()).await.map_err(Error::storage)?;
    let mut index = self.load_index().await?;
    index.upsert(IndexEntry::for_payload(&payload));
    index.last_opened_campaign_id = Some(id.clone());
    self.save_index(index).await?;

    self.load_campaign(&id).await?;
    info!(campaign_id = %id, "campaign created");
    Ok(id)
  }

  /// Make `campaign_id` the current campaign and record it as last opened.
  /// `None` (and no change) if it is not stored.
  pub async fn load_campaign(&mut self, campaign_id: &str) -> Result<Option<Arc<CampaignPayload>>> {
    let Some(payload) = self.load_stored(campaign_id).await? else {
      return Ok(None);
    };
    let payload = Arc::new(payload);
    self.current = Some(payload.clone());

    let mut index = self.load_index().await?;
    index.last_opened_campaign_id = Some(campaign_id.to_owned());
    self.save_index(index).await?;
    debug!(campaign_id, "campaign loaded");
    Ok(Some(payload))
  }

  /// Remove `campaign_id` from the index and from storage. The most recently
  /// updated remaining campaign becomes last opened; returns its ID.
  pub async fn delete_campaign(&mut self, campaign_id: &str) -> Result<Option<String>> {
    let mut index = self.load_index().await?;
    index.remove(campaign_id);
    index.last_opened_campaign_id = index.most_recent().map(|e| e.campaign_id.clone());
    let next = index.last_opened_campaign_id.clone();
    self.save_index(index).await?;
    self.storage.delete_campaign(campaign_id).await.map_err(Error::storage)?;

    if self.current_campaign_id() == Some(campaign_id) {
      self.current = None;
    }
    info!(campaign_id, "campaign deleted");
    Ok(next)
  }

  /// Save the current snapshot and refresh its index entry.
  pub async fn persist(&self) -> Result<()> {
    let Some(payload) = self.current.as_deref() else {
      return Ok(());
    };
    let campaign_id = payload.campaign.id.clone();
    self
      .storage
      .save_campaign(&campaign_id, payload.clone())
      .await
      .map_err(Error::storage)?;

    let mut index = self.load_index().await?;
    if let Some(entry) = index.entry_mut(&campaign_id) {
      entry.name = payload.campaign.name.clone();
      entry.adventure_path = payload.campaign.adventure_path.clone();
      entry.updated_at = Some(timestamp::now_iso());
    }
    self.save_index(index).await
  }

  async fn replace_current(&mut self, next: CampaignPayload) -> Result<Arc<CampaignPayload>> {
    let next = Arc::new(next);
    self.current = Some(next.clone());
    self.persist().await?;
    Ok(next)
  }

  fn require_current(&self) -> Result<Arc<CampaignPayload>> {
    self.current.clone().ok_or(Error::NoCampaign)
  }

  // ── Edits ─────────────────────────────────────────────────────────────────

  /// Overlay `updates` onto the campaign metadata. Tags are normalised and
  /// `updatedAt` refreshed; the ID never changes.
  pub async fn update_campaign_meta(&mut self, updates: &Map<String, Value>) -> Result<Arc<CampaignPayload>> {
    let current = self.require_current()?;
    let mut meta = match serde_json::to_value(&current.campaign).map_err(gmtk_core::Error::from)? {
      Value::Object(map) => map,
      _ => Map::new(),
    };
    meta.extend(updates.iter().map(|(k, v)| (k.clone(), v.clone())));
    meta.insert("id".into(), Value::String(current.campaign.id.clone()));
    meta.insert("updatedAt".into(), Value::String(timestamp::now_iso()));

    let mut campaign: CampaignMeta =
      serde_json::from_value(Value::Object(meta)).map_err(gmtk_core::Error::from)?;
    campaign.tags = normalize_tags(&campaign.tags);
    self.replace_current(current.with_campaign(campaign)).await
  }

  /// Add a new entity built from `fields`. The envelope (ID, campaign,
  /// timestamps, archive flags) is always generated, whatever `fields` says.
  pub async fn add_entity(&mut self, collection: Collection, fields: Map<String, Value>) -> Result<Entity> {
    let current = self.require_current()?;
    let now = timestamp::now_iso();
    let envelope = Entity::new(self.ids.next(collection.id_prefix()), current.campaign.id.clone(), &now);

    let mut raw = fields;
    for key in ENVELOPE_KEYS {
      raw.remove(key);
    }
    if let Value::Object(env) = serde_json::to_value(&envelope).map_err(gmtk_core::Error::from)? {
      raw.extend(env);
    }
    let entity: Entity = serde_json::from_value(Value::Object(raw)).map_err(gmtk_core::Error::from)?;

    self.replace_current(current.with_entity(collection, entity.clone())).await?;
    debug!(%collection, id = %entity.id, "entity added");
    Ok(entity)
  }

  /// Overlay `updates` onto an entity. `None` when the ID is unknown; nothing
  /// is persisted in that case.
  pub async fn update_entity(
    &mut self,
    collection: Collection,
    id: &str,
    updates: &Map<String, Value>,
  ) -> Result<Option<Entity>> {
    let current = self.require_current()?;
    let Some(next) = current.with_entity_updates(collection, id, updates, &timestamp::now_iso())? else {
      return Ok(None);
    };
    let updated = next.entity(collection, id).cloned();
    self.replace_current(next).await?;
    Ok(updated)
  }

  pub async fn archive_entity(&mut self, collection: Collection, id: &str) -> Result<Option<Entity>> {
    self.set_archived(collection, id, true).await
  }

  pub async fn unarchive_entity(&mut self, collection: Collection, id: &str) -> Result<Option<Entity>> {
    self.set_archived(collection, id, false).await
  }

  async fn set_archived(&mut self, collection: Collection, id: &str, archived: bool) -> Result<Option<Entity>> {
    let current = self.require_current()?;
    let Some(entity) = current.entity(collection, id) else {
      return Ok(None);
    };
    let now = timestamp::now_iso();
    let updated = if archived { entity.archived(&now) } else { entity.unarchived(&now) };
    self.replace_current(current.with_entity(collection, updated.clone())).await?;
    Ok(Some(updated))
  }

  /// A passphrase unused by any item of the loaded campaign.
  pub fn generate_item_passphrase<R: RngCore>(&self, rng: &mut R) -> Result<GeneratedPassphrase> {
    let current = self.require_current()?;
    let used = current.items.values().map(|item| item.field_text("passphrase"));
    Ok(passphrase::generate_unique_passphrase(rng, used, passphrase::DEFAULT_MAX_ATTEMPTS))
  }
}
