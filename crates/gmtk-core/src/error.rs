//! Error types for `gmtk-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The uploaded backup is not JSON, or not a JSON object.
  #[error("invalid document: {0}")]
  InvalidDocument(String),

  #[error("missing schema version or payload")]
  MissingFields,

  #[error("missing campaign ID")]
  MissingCampaignId,

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
