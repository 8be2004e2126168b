//! The `CampaignStorage` trait and the records it persists.
//!
//! Backends (e.g. `gmtk-store-sqlite`) implement the trait; the campaign
//! store and the import service in `gmtk-app` only see this abstraction.

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{backup::CURRENT_SCHEMA_VERSION, payload::CampaignPayload, timestamp};

/// Algorithm name recorded next to every stored checksum.
pub const CHECKSUM_ALGO: &str = "sha-256";

// ─── Index ───────────────────────────────────────────────────────────────────

/// One row of the campaign index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
  pub campaign_id:     String,
  pub name:            String,
  #[serde(default)]
  pub adventure_path:  Option<String>,
  #[serde(default)]
  pub updated_at:      Option<String>,
  #[serde(default)]
  pub is_fixture:      bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub fixture_id:      Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub fixture_label:   Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub fixture_version: Option<Value>,
}

impl IndexEntry {
  /// A non-fixture entry describing `payload`.
  pub fn for_payload(payload: &CampaignPayload) -> Self {
    let campaign = &payload.campaign;
    Self {
      campaign_id:     campaign.id.clone(),
      name:            campaign.name.clone(),
      adventure_path:  campaign.adventure_path.clone(),
      updated_at:      campaign.updated_at.clone(),
      is_fixture:      false,
      fixture_id:      None,
      fixture_label:   None,
      fixture_version: None,
    }
  }

  /// A fixture entry describing `payload`, carrying its fixture markers.
  pub fn fixture_for_payload(payload: &CampaignPayload) -> Self {
    let campaign = &payload.campaign;
    Self {
      is_fixture: true,
      fixture_id: campaign.fixture_id.clone(),
      fixture_label: campaign.fixture_label.clone(),
      fixture_version: campaign.fixture_version.clone(),
      ..Self::for_payload(payload)
    }
  }

  fn updated_millis(&self) -> i64 {
    self
      .updated_at
      .as_deref()
      .and_then(timestamp::parse_millis)
      .unwrap_or(0)
  }
}

/// The list of known campaigns and the one last opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignIndex {
  pub schema_version:          u32,
  #[serde(default)]
  pub last_opened_campaign_id: Option<String>,
  #[serde(default)]
  pub campaigns:               Vec<IndexEntry>,
}

impl Default for CampaignIndex {
  fn default() -> Self {
    Self {
      schema_version:          CURRENT_SCHEMA_VERSION,
      last_opened_campaign_id: None,
      campaigns:               Vec::new(),
    }
  }
}

impl CampaignIndex {
  pub fn entry(&self, campaign_id: &str) -> Option<&IndexEntry> {
    self.campaigns.iter().find(|e| e.campaign_id == campaign_id)
  }

  pub fn entry_mut(&mut self, campaign_id: &str) -> Option<&mut IndexEntry> {
    self.campaigns.iter_mut().find(|e| e.campaign_id == campaign_id)
  }

  /// Replace the entry with the same campaign ID, or append.
  pub fn upsert(&mut self, entry: IndexEntry) {
    match self.entry_mut(&entry.campaign_id) {
      Some(slot) => *slot = entry,
      None => self.campaigns.push(entry),
    }
  }

  /// Remove the entry for `campaign_id`; `true` if there was one.
  pub fn remove(&mut self, campaign_id: &str) -> bool {
    let before = self.campaigns.len();
    self.campaigns.retain(|e| e.campaign_id != campaign_id);
    self.campaigns.len() != before
  }

  /// Drop fixture entries carrying `fixture_id`. Non-fixture entries and
  /// other fixtures are kept. Returns the removed entries.
  pub fn remove_fixtures(&mut self, fixture_id: &str) -> Vec<IndexEntry> {
    let (removed, kept) = std::mem::take(&mut self.campaigns)
      .into_iter()
      .partition(|e| e.is_fixture && e.fixture_id.as_deref() == Some(fixture_id));
    self.campaigns = kept;
    removed
  }

  /// The entry with the latest `updatedAt`; undated entries sort first.
  pub fn most_recent(&self) -> Option<&IndexEntry> {
    self.campaigns.iter().max_by_key(|e| e.updated_millis())
  }
}

// ─── Stored campaign ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum {
  pub algo:  String,
  pub value: String,
}

/// A campaign as written to storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCampaign {
  pub schema_version:   u32,
  pub campaign_id:      String,
  pub checksum:         Checksum,
  pub saved_at:         String,
  pub payload:          CampaignPayload,
  /// Set on load: whether the recomputed checksum matched the stored one.
  #[serde(skip, default = "verified")]
  pub checksum_matches: bool,
}

fn verified() -> bool { true }

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Persistent storage for campaigns and the campaign index.
///
/// All methods return `Send` futures so implementations can be shared across
/// tokio tasks.
pub trait CampaignStorage: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The stored index, or an empty one at the current schema version.
  fn load_index(&self) -> impl Future<Output = Result<CampaignIndex, Self::Error>> + Send + '_;

  /// Replace the stored index with `index`, atomically.
  fn save_index(
    &self,
    index: CampaignIndex,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Load a campaign. `None` if it was never saved or has been deleted.
  ///
  /// The checksum is recomputed; a mismatch is reported through
  /// [`StoredCampaign::checksum_matches`], not as an error.
  fn load_campaign(
    &self,
    campaign_id: &str,
  ) -> impl Future<Output = Result<Option<StoredCampaign>, Self::Error>> + Send;

  /// Write `payload` under `campaign_id`, replacing any previous copy, and
  /// return what was stored.
  fn save_campaign(
    &self,
    campaign_id: &str,
    payload: CampaignPayload,
  ) -> impl Future<Output = Result<StoredCampaign, Self::Error>> + Send;

  /// Remove a stored campaign. Deleting an unknown ID is not an error.
  fn delete_campaign(
    &self,
    campaign_id: &str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
