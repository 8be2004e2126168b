//! Campaign export.

use gmtk_core::{backup::BackupDocument, store::CampaignStorage};
use tracing::info;

use crate::{CampaignStore, Error, Result};

/// A backup ready to be written out.
#[derive(Debug, Clone)]
pub struct Export {
  pub document:  BackupDocument,
  /// `gmtoolkit-<name>.json`
  pub file_name: String,
  /// Pretty-printed JSON, two-space indent.
  pub contents:  String,
}

impl Export {
  pub fn new(document: BackupDocument) -> Result<Self> {
    Ok(Self {
      file_name: document.file_name(),
      contents: document.to_pretty_json()?,
      document,
    })
  }
}

/// Export `campaign_id`, or the loaded campaign when `None`.
pub async fn export_campaign<S: CampaignStorage>(
  store: &CampaignStore<S>,
  campaign_id: Option<&str>,
) -> Result<Export> {
  let campaign_id = match campaign_id {
    Some(id) => id.to_owned(),
    None => store.current_campaign_id().ok_or(Error::NoCampaign)?.to_owned(),
  };
  let payload = store
    .payload_for(&campaign_id)
    .await?
    .ok_or_else(|| Error::CampaignNotFound(campaign_id.clone()))?;

  let export = Export::new(BackupDocument::new(campaign_id.clone(), (*payload).clone()))?;
  info!(campaign_id = %campaign_id, file = %export.file_name, "campaign exported");
  Ok(export)
}
