//! Conflict records and resolution strategies.
//!
//! A conflict exists when an incoming entity shares an ID with an existing
//! one and the two differ. [`resolve_conflicts`] settles a batch of them
//! according to a strategy before the merge applies them.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{collection::Collection, entity::Entity, ids::IdGenerator};

/// Appended to the display name of an entity imported as a duplicate.
pub const DEFAULT_DUPLICATE_SUFFIX: &str = "(Imported)";

// ─── Resolution ──────────────────────────────────────────────────────────────

/// How to settle a same-ID clash between an existing and an incoming entity.
///
/// Parsing is lenient: any unrecognised string becomes [`Resolution::Duplicate`],
/// the only strategy that never discards data.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumIter,
  EnumString,
  IntoStaticStr,
)]
#[serde(from = "String", into = "&'static str")]
#[strum(serialize_all = "kebab-case")]
pub enum Resolution {
  /// Keep the existing entity and add the incoming one under a new ID.
  #[default]
  Duplicate,
  /// Whichever side has the later `updatedAt`; ties go to incoming.
  MostRecent,
  Incoming,
  Existing,
}

impl Resolution {
  /// Parse a strategy name, falling back to [`Resolution::Duplicate`].
  pub fn parse_lenient(s: &str) -> Self { s.parse().unwrap_or_default() }
}

impl From<String> for Resolution {
  fn from(s: String) -> Self { Self::parse_lenient(&s) }
}

// ─── ConflictRecord ──────────────────────────────────────────────────────────

/// A same-ID, different-value clash found during import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRecord {
  /// The ID prefix (`npc`, `crt`, ...); also the prefix for a duplicate's ID.
  #[serde(rename = "type")]
  pub kind:             String,
  pub id:               String,
  pub incoming:         Entity,
  pub existing:         Entity,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub resolution:       Option<Resolution>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub duplicate_id:     Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub duplicate_suffix: Option<String>,
  /// The collection the clash was found in; set by the import dry run.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub collection:       Option<Collection>,
}

impl ConflictRecord {
  /// An unresolved conflict.
  pub fn new(kind: impl Into<String>, id: impl Into<String>, incoming: Entity, existing: Entity) -> Self {
    Self {
      kind: kind.into(),
      id: id.into(),
      incoming,
      existing,
      resolution: None,
      duplicate_id: None,
      duplicate_suffix: None,
      collection: None,
    }
  }

  /// The effective resolution; unresolved conflicts count as duplicates.
  pub fn resolution_or_default(&self) -> Resolution { self.resolution.unwrap_or_default() }
}

// ─── Resolver ────────────────────────────────────────────────────────────────

/// Settle every conflict in `conflicts`.
///
/// The effective strategy for each record is `strategy` when given, else the
/// record's own `resolution`, else [`Resolution::Duplicate`]. Duplicates get a
/// `duplicate_id` (prefixed with the record's `kind`) and a
/// `duplicate_suffix`, unless the record already carries them; resolving the
/// same record twice therefore yields the same duplicate ID.
pub fn resolve_conflicts(
  conflicts: &[ConflictRecord],
  strategy: Option<Resolution>,
  duplicate_suffix: &str,
  ids: &dyn IdGenerator,
) -> Vec<ConflictRecord> {
  conflicts
    .iter()
    .map(|conflict| {
      let resolution = strategy.or(conflict.resolution).unwrap_or_default();
      let mut resolved = ConflictRecord {
        resolution: Some(resolution),
        ..conflict.clone()
      };
      if resolution == Resolution::Duplicate {
        if resolved.duplicate_id.as_deref().is_none_or(str::is_empty) {
          resolved.duplicate_id = Some(ids.next(&conflict.kind));
        }
        if resolved.duplicate_suffix.as_deref().is_none_or(str::is_empty) {
          resolved.duplicate_suffix = Some(duplicate_suffix.to_owned());
        }
      }
      resolved
    })
    .collect()
}
