//! The eight entity collections of a campaign payload.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// One of the entity collections held by a [`CampaignPayload`].
///
/// The string form (`"party"`, `"npcs"`, ..., `"sessionReviews"`) is the key
/// used in the JSON payload.
///
/// [`CampaignPayload`]: crate::payload::CampaignPayload
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumIter,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Collection {
  Party,
  Npcs,
  Creatures,
  Encounters,
  Locations,
  Items,
  Sessions,
  SessionReviews,
}

impl Collection {
  /// The payload key for this collection.
  pub fn key(self) -> &'static str { self.into() }

  /// The ID prefix given to entities created in this collection.
  pub fn id_prefix(self) -> &'static str {
    match self {
      Self::Party => "pty",
      Self::Npcs => "npc",
      Self::Creatures => "crt",
      Self::Encounters => "enc",
      Self::Locations => "loc",
      Self::Items => "itm",
      Self::Sessions => "ses",
      Self::SessionReviews => "rev",
    }
  }
}
