//! Error type for `gmtk-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// A column held a value outside its allowed range.
  #[error("invalid value in column {column}: {value}")]
  InvalidColumn { column: &'static str, value: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
