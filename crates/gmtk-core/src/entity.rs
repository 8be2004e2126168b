//! A single record in one of the campaign collections.
//!
//! Every entity carries the same envelope (ID, owning campaign, timestamps,
//! archival flags). Collection-specific fields (an NPC's `role`, an
//! encounter's `participants`, a session's `encounterIds`) are kept verbatim
//! in an open field map so they round-trip through import and export.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::Result;

/// Entities of one collection, keyed by ID.
pub type EntityMap = BTreeMap<String, Entity>;

/// Field names tried, in order, when looking for an entity's display name.
const DISPLAY_NAME_KEYS: [&str; 3] = ["name", "title", "characterName"];

/// JSON keys of the envelope every entity carries.
pub const ENVELOPE_KEYS: [&str; 6] =
  ["id", "campaignId", "createdAt", "updatedAt", "isArchived", "archivedAt"];

/// A record in a campaign collection.
///
/// Equality is structural: two entities are equal when every envelope field
/// and every extra field holds the same value, regardless of key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
  /// Stable, type-prefixed ID (`npc_...`, `crt_...`).
  #[serde(default)]
  pub id:          String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub campaign_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at:  Option<String>,
  /// Refreshed by every update; compared by the `most-recent` resolution.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated_at:  Option<String>,
  #[serde(default, deserialize_with = "null_as_default")]
  pub is_archived: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub archived_at: Option<String>,
  /// Collection-specific fields.
  #[serde(flatten)]
  pub fields:      Map<String, Value>,
}

impl Entity {
  /// A fresh, unarchived entity stamped with `now` as both timestamps.
  pub fn new(id: impl Into<String>, campaign_id: impl Into<String>, now: &str) -> Self {
    Self {
      id:          id.into(),
      campaign_id: Some(campaign_id.into()),
      created_at:  Some(now.to_owned()),
      updated_at:  Some(now.to_owned()),
      is_archived: false,
      archived_at: None,
      fields:      Map::new(),
    }
  }

  /// Builder-style setter for a collection-specific field.
  pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
    self.set_field(key, value);
    self
  }

  pub fn field(&self, key: &str) -> Option<&Value> { self.fields.get(key) }

  pub fn field_str(&self, key: &str) -> Option<&str> {
    self.fields.get(key).and_then(Value::as_str)
  }

  /// A string or number field rendered as text; empty for anything else.
  pub fn field_text(&self, key: &str) -> String {
    match self.fields.get(key) {
      Some(Value::String(s)) => s.clone(),
      Some(Value::Number(n)) => n.to_string(),
      _ => String::new(),
    }
  }

  pub fn set_field(&mut self, key: &str, value: impl Into<Value>) {
    self.fields.insert(key.to_owned(), value.into());
  }

  /// The field holding this entity's human-readable name: the first of
  /// `name`, `title`, `characterName` that is present, else `name`.
  pub fn display_name_key(&self) -> &'static str {
    DISPLAY_NAME_KEYS
      .into_iter()
      .find(|key| self.fields.contains_key(*key))
      .unwrap_or(DISPLAY_NAME_KEYS[0])
  }

  pub fn display_name(&self) -> Option<&str> {
    self.field_str(self.display_name_key()).filter(|s| !s.is_empty())
  }

  /// The string entries of the `tags` array.
  pub fn tags(&self) -> Vec<String> {
    match self.fields.get("tags") {
      Some(Value::Array(items)) => items
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_owned)
        .collect(),
      _ => Vec::new(),
    }
  }

  /// A copy with `updates` laid over this entity and `updatedAt` set to
  /// `now`. The ID never changes.
  pub fn with_updates(&self, updates: &Map<String, Value>, now: &str) -> Result<Self> {
    let mut merged = match serde_json::to_value(self)? {
      Value::Object(map) => map,
      _ => Map::new(),
    };
    merged.extend(updates.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged.insert("id".into(), Value::String(self.id.clone()));
    merged.insert("updatedAt".into(), Value::String(now.to_owned()));
    Ok(serde_json::from_value(Value::Object(merged))?)
  }

  /// A copy marked archived at `now`.
  pub fn archived(&self, now: &str) -> Self {
    Self {
      is_archived: true,
      archived_at: Some(now.to_owned()),
      updated_at: Some(now.to_owned()),
      ..self.clone()
    }
  }

  /// A copy with the archival flags cleared.
  pub fn unarchived(&self, now: &str) -> Self {
    Self {
      is_archived: false,
      archived_at: None,
      updated_at: Some(now.to_owned()),
      ..self.clone()
    }
  }
}

/// Deserialize `null` as the type's default instead of failing.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: Default + Deserialize<'de>,
{
  Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
