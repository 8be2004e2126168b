//! In-memory search over one campaign payload.
//!
//! The index is rebuilt from a payload snapshot whenever the campaign
//! changes; it never outlives the snapshot it was built from.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use strum::{Display, IntoEnumIterator, IntoStaticStr};

use crate::{
  collection::Collection,
  entity::Entity,
  payload::CampaignPayload,
  tags::{matches_text, normalize_tag},
};

const REVIEW_TITLE_CHARS: usize = 60;

/// Scopes searched by [`SearchIndex::suggest_tags`] when none are given.
pub const DEFAULT_TAG_SCOPES: [Collection; 6] = [
  Collection::Npcs,
  Collection::Creatures,
  Collection::Encounters,
  Collection::Locations,
  Collection::Items,
  Collection::Sessions,
];

/// What a global search hit refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, IntoStaticStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DocKind {
  Party,
  Npc,
  Creature,
  Encounter,
  Location,
  Item,
  Session,
  Review,
}

impl From<Collection> for DocKind {
  fn from(collection: Collection) -> Self {
    match collection {
      Collection::Party => Self::Party,
      Collection::Npcs => Self::Npc,
      Collection::Creatures => Self::Creature,
      Collection::Encounters => Self::Encounter,
      Collection::Locations => Self::Location,
      Collection::Items => Self::Item,
      Collection::Sessions => Self::Session,
      Collection::SessionReviews => Self::Review,
    }
  }
}

/// A global search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchDoc {
  pub id:          String,
  #[serde(rename = "type")]
  pub kind:        DocKind,
  pub title:       String,
  /// Secondary line: role, CR, parent location, session date...
  pub meta:        String,
  pub tags:        Vec<String>,
  pub is_archived: bool,
}

/// An NPC search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NpcDoc {
  pub id:          String,
  pub name:        String,
  pub role:        String,
  pub class_name:  String,
  pub notes:       String,
  pub tags:        Vec<String>,
  pub is_archived: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SearchIndex {
  global: Vec<SearchDoc>,
  npcs:   Vec<NpcDoc>,
  tags:   HashMap<Collection, Vec<String>>,
}

impl SearchIndex {
  pub fn build(payload: &CampaignPayload) -> Self {
    let location_names: HashMap<&str, &str> = payload
      .locations
      .values()
      .map(|l| (l.id.as_str(), l.field_str("name").unwrap_or_default()))
      .collect();
    let session_titles: HashMap<&str, &str> = payload
      .sessions
      .values()
      .map(|s| (s.id.as_str(), s.field_str("title").unwrap_or("Untitled session")))
      .collect();

    let mut global = Vec::with_capacity(payload.entity_count());
    let mut tags = HashMap::new();

    for collection in Collection::iter() {
      let mut scope_tags = Vec::new();
      for entity in payload.collection(collection).values() {
        let entity_tags: Vec<String> =
          entity.tags().iter().map(|t| normalize_tag(t)).collect();
        scope_tags.extend(entity_tags.iter().cloned());

        let (title, meta) = match collection {
          Collection::Party => (
            non_empty(entity.field_str("characterName")).unwrap_or("Unnamed character").to_owned(),
            join_meta([
              non_empty(entity.field_str("playerName")).map(|p| format!("Player: {p}")),
              text(entity, "class"),
            ]),
          ),
          Collection::Npcs => (
            entity.field_text("name"),
            join_meta([
              text(entity, "role"),
              text(entity, "class"),
              text(entity, "level").filter(|l| l != "0").map(|l| format!("Level {l}")),
            ]),
          ),
          Collection::Creatures => (
            entity.field_text("name"),
            join_meta([
              text(entity, "type"),
              text(entity, "cr").map(|cr| format!("CR {cr}")),
            ]),
          ),
          Collection::Encounters => (
            entity.field_text("title"),
            labelled("Map", text(entity, "mapRef")),
          ),
          Collection::Locations => (
            entity.field_text("name"),
            labelled(
              "Parent",
              text(entity, "parentLocationId").map(|parent| {
                non_empty(location_names.get(parent.as_str()).copied())
                  .unwrap_or("Unknown")
                  .to_owned()
              }),
            ),
          ),
          Collection::Items => (
            entity.field_text("name"),
            labelled("Passphrase", text(entity, "passphrase")),
          ),
          Collection::Sessions => (
            non_empty(entity.field_str("title")).unwrap_or("Untitled session").to_owned(),
            labelled("Date", text(entity, "date")),
          ),
          Collection::SessionReviews => (
            text(entity, "summary")
              .map(|s| s.chars().take(REVIEW_TITLE_CHARS).collect())
              .unwrap_or_else(|| "Session review".to_owned()),
            labelled(
              "Session",
              text(entity, "sessionId").map(|id| {
                session_titles.get(id.as_str()).copied().unwrap_or("Unknown").to_owned()
              }),
            ),
          ),
        };

        let doc_tags = match collection {
          Collection::Party | Collection::SessionReviews => Vec::new(),
          _ => entity_tags.clone(),
        };
        global.push(SearchDoc {
          id: entity.id.clone(),
          kind: collection.into(),
          title,
          meta,
          tags: doc_tags,
          is_archived: entity.is_archived,
        });
      }
      tags.insert(collection, scope_tags);
    }

    let npcs = payload
      .npcs
      .values()
      .map(|npc| NpcDoc {
        id:          npc.id.clone(),
        name:        npc.field_text("name"),
        role:        npc.field_text("role"),
        class_name:  npc.field_text("class"),
        notes:       npc.field_text("notes"),
        tags:        npc.tags().iter().map(|t| normalize_tag(t)).collect(),
        is_archived: npc.is_archived,
      })
      .collect();

    Self { global, npcs, tags }
  }

  /// Title and tag matches across every collection. An empty query finds
  /// nothing.
  pub fn search_global(&self, query: &str) -> Vec<&SearchDoc> {
    if query.is_empty() {
      return Vec::new();
    }
    self
      .global
      .iter()
      .filter(|doc| {
        let haystack = std::iter::once(doc.title.as_str())
          .chain(doc.tags.iter().map(String::as_str))
          .collect::<Vec<_>>()
          .join(" ");
        matches_text(&haystack, query)
      })
      .collect()
  }

  /// Name, notes and tag matches among NPCs. An empty query returns them
  /// all.
  pub fn search_npcs(&self, query: &str) -> Vec<&NpcDoc> {
    self
      .npcs
      .iter()
      .filter(|npc| {
        if query.is_empty() {
          return true;
        }
        let haystack = [npc.name.as_str(), npc.notes.as_str()]
          .into_iter()
          .chain(npc.tags.iter().map(String::as_str))
          .collect::<Vec<_>>()
          .join(" ");
        matches_text(&haystack, query)
      })
      .collect()
  }

  /// Distinct non-empty tags used in `scopes`, or in
  /// [`DEFAULT_TAG_SCOPES`] when `scopes` is empty. Sorted.
  pub fn suggest_tags(&self, scopes: &[Collection]) -> Vec<String> {
    let scopes = if scopes.is_empty() { &DEFAULT_TAG_SCOPES[..] } else { scopes };
    scopes
      .iter()
      .filter_map(|scope| self.tags.get(scope))
      .flatten()
      .filter(|tag| !tag.is_empty())
      .cloned()
      .collect::<BTreeSet<_>>()
      .into_iter()
      .collect()
  }

  /// Number of global documents, grouped by kind.
  pub fn counts(&self) -> BTreeMap<&'static str, usize> {
    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for doc in &self.global {
      *counts.entry(doc.kind.into()).or_default() += 1;
    }
    counts
  }
}

fn non_empty(s: Option<&str>) -> Option<&str> { s.filter(|s| !s.is_empty()) }

fn text(entity: &Entity, key: &str) -> Option<String> {
  Some(entity.field_text(key)).filter(|s| !s.is_empty())
}

fn join_meta<const N: usize>(parts: [Option<String>; N]) -> String {
  parts.into_iter().flatten().collect::<Vec<_>>().join(" • ")
}

fn labelled(label: &str, value: Option<String>) -> String {
  value.map(|v| format!("{label}: {v}")).unwrap_or_default()
}
