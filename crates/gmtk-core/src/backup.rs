//! The backup document: the import/export file format.
//!
//! ```json
//! {
//!   "schemaVersion": 1,
//!   "exportedAt": "2024-01-02T03:04:05.678Z",
//!   "campaignId": "cmp_...",
//!   "payload": { "campaign": { ... }, "npcs": { ... }, ... },
//!   "isFixture": false,
//!   "fixtureId": null,
//!   "fixtureLabel": null,
//!   "fixtureVersion": null
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
  Error, Result,
  entity::null_as_default,
  payload::CampaignPayload,
  timestamp,
};

/// The schema version written by this build.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
  pub schema_version:  u32,
  #[serde(default)]
  pub exported_at:     Option<String>,
  pub campaign_id:     String,
  pub payload:         CampaignPayload,
  #[serde(default, deserialize_with = "null_as_default")]
  pub is_fixture:      bool,
  #[serde(default)]
  pub fixture_id:      Option<String>,
  #[serde(default)]
  pub fixture_label:   Option<String>,
  #[serde(default)]
  pub fixture_version: Option<Value>,
}

impl BackupDocument {
  /// A backup of `payload` stamped with the current time and schema. The
  /// fixture markers are copied from the payload's campaign.
  pub fn new(campaign_id: impl Into<String>, payload: CampaignPayload) -> Self {
    let campaign = &payload.campaign;
    Self {
      schema_version:  CURRENT_SCHEMA_VERSION,
      exported_at:     Some(timestamp::now_iso()),
      campaign_id:     campaign_id.into(),
      is_fixture:      campaign.is_fixture,
      fixture_id:      campaign.fixture_id.clone(),
      fixture_label:   campaign.fixture_label.clone(),
      fixture_version: campaign.fixture_version.clone(),
      payload,
    }
  }

  /// Validate and decode an uploaded file.
  ///
  /// Checks run in order and the first failure wins:
  ///
  /// 1. not JSON, or not a JSON object: [`Error::InvalidDocument`]
  /// 2. `schemaVersion` absent, null, zero or not a number, or `payload` not
  ///    an object: [`Error::MissingFields`]
  /// 3. neither `campaignId` nor `payload.campaign.id`:
  ///    [`Error::MissingCampaignId`]
  ///
  /// Whichever of the two campaign IDs is missing is filled from the other,
  /// and entities stored without an `id` take their map key.
  pub fn parse(text: &str) -> Result<Self> {
    let value: Value =
      serde_json::from_str(text).map_err(|e| Error::InvalidDocument(e.to_string()))?;
    Self::from_value(value)
  }

  /// [`BackupDocument::parse`] for an already-decoded value.
  pub fn from_value(value: Value) -> Result<Self> {
    let Value::Object(mut doc) = value else {
      return Err(Error::InvalidDocument("not a JSON object".into()));
    };

    let version_ok = doc
      .get("schemaVersion")
      .and_then(Value::as_f64)
      .is_some_and(|v| v != 0.0);
    let payload_ok = doc.get("payload").is_some_and(Value::is_object);
    if !version_ok || !payload_ok {
      return Err(Error::MissingFields);
    }

    let top_id = non_empty_str(doc.get("campaignId"));
    let inner_id = non_empty_str(doc.get("payload").and_then(|p| p.pointer("/campaign/id")));
    let campaign_id = top_id.or(inner_id.clone()).ok_or(Error::MissingCampaignId)?;

    doc.insert("campaignId".into(), Value::String(campaign_id.clone()));
    if inner_id.is_none()
      && let Some(Value::Object(payload)) = doc.get_mut("payload")
    {
      let campaign = payload
        .entry("campaign")
        .or_insert_with(|| Value::Object(Default::default()));
      if let Value::Object(campaign) = campaign {
        campaign.insert("id".into(), Value::String(campaign_id));
      }
    }

    let mut backup: Self = serde_json::from_value(Value::Object(doc))
      .map_err(|e| Error::InvalidDocument(e.to_string()))?;
    backup.payload.fill_missing_ids();
    Ok(backup)
  }

  /// `gmtoolkit-<campaign name>.json`, or `gmtoolkit-campaign.json` for an
  /// unnamed campaign.
  pub fn file_name(&self) -> String {
    let name = self.payload.campaign.name.as_str();
    let name = if name.is_empty() { "campaign" } else { name };
    format!("gmtoolkit-{name}.json")
  }

  /// Pretty-printed JSON with two-space indentation.
  pub fn to_pretty_json(&self) -> Result<String> { Ok(serde_json::to_string_pretty(self)?) }

  /// Display label for prompts: the campaign name, else its ID.
  pub fn label(&self) -> &str {
    let name = self.payload.campaign.name.as_str();
    if name.is_empty() { &self.campaign_id } else { name }
  }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
  value
    .and_then(Value::as_str)
    .filter(|s| !s.is_empty())
    .map(str::to_owned)
}
