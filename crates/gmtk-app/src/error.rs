//! Error type for campaign and import services.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] gmtk_core::Error),

  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// An operation needed a loaded campaign and none was.
  #[error("no campaign loaded")]
  NoCampaign,

  #[error("campaign not found: {0}")]
  CampaignNotFound(String),
}

impl Error {
  pub(crate) fn storage<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Storage(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
