//! The campaign payload: metadata plus eight entity collections.
//!
//! Payloads are treated as immutable snapshots. The `with_*` helpers return a
//! new payload and leave the receiver untouched, so a snapshot handed to one
//! caller never changes underneath it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::IntoEnumIterator;

use crate::{
  Result,
  collection::Collection,
  entity::{Entity, EntityMap, null_as_default},
};

/// XP is split across this many party members when the roster is empty.
pub const DEFAULT_PARTY_SIZE_FOR_XP_SPLIT: u32 = 4;

fn is_false(b: &bool) -> bool { !*b }

// ─── Campaign metadata ───────────────────────────────────────────────────────

/// The `campaign` object of a payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignMeta {
  #[serde(default)]
  pub id:              String,
  #[serde(default, deserialize_with = "null_as_default")]
  pub name:            String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub adventure_path:  Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub notes:           Option<String>,
  #[serde(default, deserialize_with = "null_as_default")]
  pub tags:            Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at:      Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated_at:      Option<String>,
  /// Test/demo data that may be replaced wholesale by a fixture import.
  #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "is_false")]
  pub is_fixture:      bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub fixture_id:      Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub fixture_label:   Option<String>,
  /// Free-form; backups carry either a number or a string here.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub fixture_version: Option<Value>,
  /// Everything else (`partySizeForXpSplit`, ...).
  #[serde(flatten)]
  pub extra:           Map<String, Value>,
}

impl CampaignMeta {
  /// `self` with every field present in `incoming` laid over it. The ID of
  /// `self` is kept.
  pub fn overlay(&self, incoming: &CampaignMeta) -> Result<Self> {
    let mut merged = match serde_json::to_value(self)? {
      Value::Object(map) => map,
      _ => Map::new(),
    };
    if let Value::Object(over) = serde_json::to_value(incoming)? {
      merged.extend(over);
    }
    merged.insert("id".into(), Value::String(self.id.clone()));
    Ok(serde_json::from_value(Value::Object(merged))?)
  }
}

// ─── Payload ─────────────────────────────────────────────────────────────────

/// A complete campaign dataset. Collections missing from a document
/// deserialize as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignPayload {
  pub campaign:        CampaignMeta,
  #[serde(default, deserialize_with = "null_as_default")]
  pub party:           EntityMap,
  #[serde(default, deserialize_with = "null_as_default")]
  pub npcs:            EntityMap,
  #[serde(default, deserialize_with = "null_as_default")]
  pub creatures:       EntityMap,
  #[serde(default, deserialize_with = "null_as_default")]
  pub encounters:      EntityMap,
  #[serde(default, deserialize_with = "null_as_default")]
  pub locations:       EntityMap,
  #[serde(default, deserialize_with = "null_as_default")]
  pub items:           EntityMap,
  #[serde(default, deserialize_with = "null_as_default")]
  pub sessions:        EntityMap,
  #[serde(default, deserialize_with = "null_as_default")]
  pub session_reviews: EntityMap,
  #[serde(flatten)]
  pub extra:           Map<String, Value>,
}

impl CampaignPayload {
  /// A payload with `campaign` and no entities.
  pub fn new(campaign: CampaignMeta) -> Self {
    Self { campaign, ..Self::default() }
  }

  pub fn collection(&self, collection: Collection) -> &EntityMap {
    match collection {
      Collection::Party => &self.party,
      Collection::Npcs => &self.npcs,
      Collection::Creatures => &self.creatures,
      Collection::Encounters => &self.encounters,
      Collection::Locations => &self.locations,
      Collection::Items => &self.items,
      Collection::Sessions => &self.sessions,
      Collection::SessionReviews => &self.session_reviews,
    }
  }

  pub fn collection_mut(&mut self, collection: Collection) -> &mut EntityMap {
    match collection {
      Collection::Party => &mut self.party,
      Collection::Npcs => &mut self.npcs,
      Collection::Creatures => &mut self.creatures,
      Collection::Encounters => &mut self.encounters,
      Collection::Locations => &mut self.locations,
      Collection::Items => &mut self.items,
      Collection::Sessions => &mut self.sessions,
      Collection::SessionReviews => &mut self.session_reviews,
    }
  }

  pub fn entity(&self, collection: Collection, id: &str) -> Option<&Entity> {
    self.collection(collection).get(id)
  }

  /// Total number of entities across all collections.
  pub fn entity_count(&self) -> usize {
    Collection::iter().map(|c| self.collection(c).len()).sum()
  }

  /// Give every entity stored without an `id` the key it is stored under.
  pub fn fill_missing_ids(&mut self) {
    for collection in Collection::iter() {
      for (key, entity) in self.collection_mut(collection).iter_mut() {
        if entity.id.is_empty() {
          entity.id = key.clone();
        }
      }
    }
  }

  // ── Snapshot updates ──────────────────────────────────────────────────────

  /// A copy with `entity` inserted (or replaced) under its own ID.
  pub fn with_entity(&self, collection: Collection, entity: Entity) -> Self {
    let mut next = self.clone();
    next.collection_mut(collection).insert(entity.id.clone(), entity);
    next
  }

  /// A copy with `updates` applied to entity `id`. `Ok(None)` when the
  /// entity does not exist.
  pub fn with_entity_updates(
    &self,
    collection: Collection,
    id: &str,
    updates: &Map<String, Value>,
    now: &str,
  ) -> Result<Option<Self>> {
    let Some(current) = self.entity(collection, id) else {
      return Ok(None);
    };
    let updated = current.with_updates(updates, now)?;
    Ok(Some(self.with_entity(collection, updated)))
  }

  /// A copy with the campaign metadata replaced.
  pub fn with_campaign(&self, campaign: CampaignMeta) -> Self {
    Self { campaign, ..self.clone() }
  }
}
