//! Merge pipeline: incoming payload → conflicts → merged collections.
//!
//! Three operations:
//!
//! - [`detect_conflicts`] finds same-ID entities whose values differ.
//! - [`apply_resolutions`] folds an incoming collection into an existing one,
//!   honouring the resolution chosen for each conflict.
//! - [`remap_ids_for_copy`] gives every entity of a payload a fresh ID so it
//!   can be stored as an independent campaign, rewriting the references that
//!   point between entities of the same payload.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::IntoEnumIterator;

use crate::{
  collection::Collection,
  conflict::{ConflictRecord, DEFAULT_DUPLICATE_SUFFIX, Resolution},
  entity::{Entity, EntityMap},
  ids::{CAMPAIGN_PREFIX, IdGenerator, id_prefix},
  payload::CampaignPayload,
  timestamp,
};

/// Base name given to a duplicate whose source has no display name.
const IMPORTED_NAME: &str = "Imported";

/// Suffix appended to the name of a campaign imported as a copy.
pub const COPY_NAME_SUFFIX: &str = "(Imported)";

// ─── Conflict detection ──────────────────────────────────────────────────────

/// Every incoming entity whose ID also exists in `existing` with a different
/// value. Entities only present on one side never conflict.
pub fn detect_conflicts(existing: &EntityMap, incoming: &EntityMap) -> Vec<ConflictRecord> {
  incoming
    .iter()
    .filter_map(|(id, entity)| {
      let current = existing.get(id)?;
      (current != entity).then(|| {
        ConflictRecord::new(id_prefix(id), id.clone(), entity.clone(), current.clone())
      })
    })
    .collect()
}

// ─── Applying resolutions ────────────────────────────────────────────────────

/// Fold `incoming` into a copy of `existing`.
///
/// Incoming entities without a matching resolution are written under their
/// own ID (new entities and silent updates). Matched ones follow their
/// resolution; see [`Resolution`]. No existing ID is ever removed.
pub fn apply_resolutions<'a>(
  existing: &EntityMap,
  incoming: impl IntoIterator<Item = &'a Entity>,
  resolutions: &[ConflictRecord],
  ids: &dyn IdGenerator,
) -> EntityMap {
  let mut result = existing.clone();
  let by_id: HashMap<&str, &ConflictRecord> =
    resolutions.iter().map(|c| (c.id.as_str(), c)).collect();

  for entity in incoming {
    let Some(conflict) = by_id.get(entity.id.as_str()) else {
      result.insert(entity.id.clone(), entity.clone());
      continue;
    };

    // The map is re-read at apply time; the record's snapshot is only a
    // fallback for an entity that has since vanished.
    let current = existing.get(&entity.id).unwrap_or(&conflict.existing);

    match conflict.resolution_or_default() {
      Resolution::Existing => {
        result.insert(entity.id.clone(), current.clone());
      }
      Resolution::Incoming => {
        result.insert(entity.id.clone(), conflict.incoming.clone());
      }
      Resolution::MostRecent => {
        let winner = if incoming_is_newer(&conflict.incoming, current) {
          &conflict.incoming
        } else {
          current
        };
        result.insert(entity.id.clone(), winner.clone());
      }
      Resolution::Duplicate => {
        result.insert(entity.id.clone(), current.clone());
        let duplicate = duplicate_of(conflict, ids);
        result.insert(duplicate.id.clone(), duplicate);
      }
    }
  }

  result
}

/// `updatedAt` in epoch millis; a missing or empty value counts as the epoch.
fn updated_millis(entity: &Entity) -> Option<i64> {
  match entity.updated_at.as_deref() {
    None | Some("") => Some(0),
    Some(s) => timestamp::parse_millis(s),
  }
}

/// Ties go to the incoming side. An unparseable timestamp on either side
/// keeps the existing entity.
fn incoming_is_newer(incoming: &Entity, existing: &Entity) -> bool {
  matches!(
    (updated_millis(incoming), updated_millis(existing)),
    (Some(i), Some(e)) if i >= e
  )
}

fn duplicate_of(conflict: &ConflictRecord, ids: &dyn IdGenerator) -> Entity {
  let id = conflict
    .duplicate_id
    .clone()
    .filter(|id| !id.is_empty())
    .unwrap_or_else(|| ids.next(&conflict.kind));
  let suffix = conflict
    .duplicate_suffix
    .as_deref()
    .filter(|s| !s.is_empty())
    .unwrap_or(DEFAULT_DUPLICATE_SUFFIX);

  let source = &conflict.incoming;
  let name_key = source.display_name_key();
  let base = source.display_name().unwrap_or(IMPORTED_NAME);
  let name = format!("{base} {suffix}").trim().to_owned();

  let mut duplicate = source.clone();
  duplicate.id = id;
  duplicate.set_field(name_key, name);
  duplicate
}

// ─── Copy remap ──────────────────────────────────────────────────────────────

/// A same-payload reference that had no counterpart in the remap and was
/// left pointing at its old ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanedReference {
  pub collection: Collection,
  /// New ID of the entity holding the reference.
  pub entity_id:  String,
  pub field:      String,
  /// The unmapped ID, kept as-is.
  pub ref_id:     String,
}

/// The result of [`remap_ids_for_copy`].
#[derive(Debug, Clone)]
pub struct CopyRemap {
  pub payload:             CampaignPayload,
  pub new_campaign_id:     String,
  pub orphaned_references: Vec<OrphanedReference>,
}

/// Old ID → new ID, per collection.
type IdMaps = HashMap<Collection, HashMap<String, String>>;

/// Re-key every entity of `payload` for storage as a new campaign.
///
/// All new IDs are assigned before any reference is rewritten, so every
/// occurrence of an old ID resolves to the same new ID. Rewritten references:
///
/// - `encounter.participants[].refId` for `npc` and `creature` participants
/// - `session.encounterIds[]`
/// - `location.parentLocationId`
/// - `npc.locationId`
///
/// Session reviews keep their references untouched.
pub fn remap_ids_for_copy(payload: &CampaignPayload, ids: &dyn IdGenerator) -> CopyRemap {
  let new_campaign_id = ids.next(CAMPAIGN_PREFIX);

  let maps: IdMaps = Collection::iter()
    .map(|collection| {
      let map = payload
        .collection(collection)
        .keys()
        .map(|old| (old.clone(), ids.next(collection.id_prefix())))
        .collect();
      (collection, map)
    })
    .collect();

  let mut campaign = payload.campaign.clone();
  let base_name = if campaign.name.is_empty() { "Campaign" } else { campaign.name.as_str() };
  campaign.name = format!("{base_name} {COPY_NAME_SUFFIX}");
  campaign.id = new_campaign_id.clone();
  campaign.is_fixture = false;
  campaign.fixture_id = None;
  campaign.fixture_label = None;
  campaign.fixture_version = None;

  let mut remapped = CampaignPayload {
    campaign,
    extra: payload.extra.clone(),
    ..CampaignPayload::default()
  };
  let mut orphans = Vec::new();

  for collection in Collection::iter() {
    let ids_for = &maps[&collection];
    let target = remapped.collection_mut(collection);
    for (old_id, entity) in payload.collection(collection) {
      let new_id = ids_for[old_id].clone();
      let mut copy = entity.clone();
      copy.id = new_id.clone();
      copy.campaign_id = Some(new_campaign_id.clone());

      let mut rewriter = RefRewriter { maps: &maps, collection, entity_id: &new_id, orphans: &mut orphans };
      match collection {
        Collection::Encounters => rewriter.participants(&mut copy),
        Collection::Sessions => rewriter.id_list(&mut copy, "encounterIds", Collection::Encounters),
        Collection::Locations => rewriter.single(&mut copy, "parentLocationId", Collection::Locations),
        Collection::Npcs => rewriter.single(&mut copy, "locationId", Collection::Locations),
        _ => {}
      }

      target.insert(new_id, copy);
    }
  }

  CopyRemap {
    payload: remapped,
    new_campaign_id,
    orphaned_references: orphans,
  }
}

/// Rewrites reference fields of one entity, recording misses.
struct RefRewriter<'a> {
  maps:       &'a IdMaps,
  collection: Collection,
  entity_id:  &'a str,
  orphans:    &'a mut Vec<OrphanedReference>,
}

impl RefRewriter<'_> {
  fn lookup(&mut self, target: Collection, field: &str, old: &str) -> String {
    if let Some(new) = self.maps.get(&target).and_then(|m| m.get(old)) {
      return new.clone();
    }
    self.orphans.push(OrphanedReference {
      collection: self.collection,
      entity_id:  self.entity_id.to_owned(),
      field:      field.to_owned(),
      ref_id:     old.to_owned(),
    });
    old.to_owned()
  }

  /// `participants[].refId`, resolved against NPCs or creatures by `type`.
  fn participants(&mut self, entity: &mut Entity) {
    let Some(Value::Array(participants)) = entity.fields.get_mut("participants") else {
      return;
    };
    for participant in participants.iter_mut().filter_map(Value::as_object_mut) {
      let target = match participant.get("type").and_then(Value::as_str) {
        Some("npc") => Collection::Npcs,
        Some("creature") => Collection::Creatures,
        _ => continue,
      };
      let Some(old) = participant.get("refId").and_then(Value::as_str).map(str::to_owned) else {
        continue;
      };
      let new = self.lookup(target, "participants.refId", &old);
      participant.insert("refId".into(), Value::String(new));
    }
  }

  /// An array of ID strings.
  fn id_list(&mut self, entity: &mut Entity, field: &str, target: Collection) {
    let Some(Value::Array(list)) = entity.fields.get_mut(field) else {
      return;
    };
    for slot in list.iter_mut() {
      if let Some(old) = slot.as_str().map(str::to_owned) {
        *slot = Value::String(self.lookup(target, field, &old));
      }
    }
  }

  /// A single, optional ID string. Empty strings and nulls mean "no link".
  fn single(&mut self, entity: &mut Entity, field: &str, target: Collection) {
    let Some(old) = entity.field_str(field).filter(|s| !s.is_empty()).map(str::to_owned) else {
      return;
    };
    let new = self.lookup(target, field, &old);
    entity.set_field(field, new);
  }
}
