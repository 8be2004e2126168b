//! Runtime configuration: an optional TOML file under `GMTK_*` environment
//! variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use gmtk_core::conflict::DEFAULT_DUPLICATE_SUFFIX;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// SQLite database holding the index and every campaign.
  #[serde(default = "default_store_path")]
  pub store_path:       PathBuf,
  /// Where exports and post-import backups are written.
  #[serde(default = "default_export_dir")]
  pub export_dir:       PathBuf,
  /// Appended to the names of entities imported as duplicates.
  #[serde(default = "default_duplicate_suffix")]
  pub duplicate_suffix: String,
}

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/gmtk/campaigns.db") }

fn default_export_dir() -> PathBuf { PathBuf::from(".") }

fn default_duplicate_suffix() -> String { DEFAULT_DUPLICATE_SUFFIX.to_owned() }

impl Config {
  /// Read `path` if it exists, then apply `GMTK_STORE_PATH` and friends.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("GMTK"))
      .build()
      .context("failed to read config file")?;

    let mut cfg: Config = settings
      .try_deserialize()
      .context("failed to deserialise Config")?;
    cfg.store_path = expand_tilde(&cfg.store_path);
    cfg.export_dir = expand_tilde(&cfg.export_dir);
    Ok(cfg)
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
