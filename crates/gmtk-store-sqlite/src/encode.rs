//! Conversions between core types and the values stored in SQLite columns.
//!
//! Payloads and fixture versions are stored as compact JSON; timestamps are
//! kept as the ISO 8601 strings the core types already carry.

use gmtk_core::store::{Checksum, IndexEntry, StoredCampaign};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::{Error, Result};

// ─── Checksum ────────────────────────────────────────────────────────────────

/// Lowercase hex SHA-256 of `payload_json`.
pub fn checksum(payload_json: &str) -> String { hex::encode(Sha256::digest(payload_json.as_bytes())) }

// ─── Integers ────────────────────────────────────────────────────────────────

pub fn decode_schema_version(column: &'static str, v: i64) -> Result<u32> {
  u32::try_from(v).map_err(|_| Error::InvalidColumn { column, value: v.to_string() })
}

// ─── Fixture version ─────────────────────────────────────────────────────────

pub fn encode_fixture_version(v: Option<&Value>) -> Result<Option<String>> {
  Ok(v.map(serde_json::to_string).transpose()?)
}

pub fn decode_fixture_version(s: Option<&str>) -> Result<Option<Value>> {
  Ok(s.map(serde_json::from_str).transpose()?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read from a `campaigns` row.
pub struct RawCampaign {
  pub campaign_id:    String,
  pub schema_version: i64,
  pub checksum_algo:  String,
  pub checksum:       String,
  pub saved_at:       String,
  pub payload_json:   String,
}

impl RawCampaign {
  /// Decode the row, recomputing the checksum over the stored JSON text.
  pub fn into_stored(self) -> Result<StoredCampaign> {
    let checksum_matches = checksum(&self.payload_json) == self.checksum;
    Ok(StoredCampaign {
      schema_version: decode_schema_version("campaigns.schema_version", self.schema_version)?,
      campaign_id: self.campaign_id,
      checksum: Checksum { algo: self.checksum_algo, value: self.checksum },
      saved_at: self.saved_at,
      payload: serde_json::from_str(&self.payload_json)?,
      checksum_matches,
    })
  }
}

/// Raw values read from an `index_entries` row.
pub struct RawIndexEntry {
  pub campaign_id:          String,
  pub name:                 String,
  pub adventure_path:       Option<String>,
  pub updated_at:           Option<String>,
  pub is_fixture:           bool,
  pub fixture_id:           Option<String>,
  pub fixture_label:        Option<String>,
  pub fixture_version_json: Option<String>,
}

impl RawIndexEntry {
  pub fn into_entry(self) -> Result<IndexEntry> {
    Ok(IndexEntry {
      fixture_version: decode_fixture_version(self.fixture_version_json.as_deref())?,
      campaign_id:     self.campaign_id,
      name:            self.name,
      adventure_path:  self.adventure_path,
      updated_at:      self.updated_at,
      is_fixture:      self.is_fixture,
      fixture_id:      self.fixture_id,
      fixture_label:   self.fixture_label,
    })
  }
}
