//! `gmtk`: command-line front end for the GM-Toolkit campaign notebook.
//!
//! Reads `gmtk.toml` (or the path given with `--config`) and `GMTK_*`
//! environment variables, opens the SQLite campaign store and runs one
//! subcommand.
//!
//! ```
//! gmtk create "Rise of the Runelords" --tag sandpoint
//! gmtk import backup.json --merge --strategy most-recent
//! gmtk export --out ~/backups
//! ```

mod commands;
mod config;
mod prompt;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use gmtk_app::{CampaignStore, campaign_store::NewCampaign, import::ImportAction};
use gmtk_core::{conflict::Resolution, ids::RandomIds};
use gmtk_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::{
  config::Config,
  prompt::{Terminal, Unattended},
};

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "gmtk", author, version, about = "GM-Toolkit campaign notebook")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "gmtk.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// List stored campaigns; `*` marks the last opened.
  List,

  /// Create a campaign and open it.
  Create {
    name:           String,
    #[arg(long)]
    adventure_path: Option<String>,
    #[arg(long)]
    notes:          Option<String>,
    #[arg(short, long = "tag")]
    tags:           Vec<String>,
  },

  /// Import a backup file. Prompts unless an answer flag is given.
  Import {
    file:     PathBuf,
    /// Merge into the campaign with the same ID.
    #[arg(long, conflicts_with = "copy")]
    merge:    bool,
    /// Import as a new, independent campaign.
    #[arg(long)]
    copy:     bool,
    /// Conflict strategy: duplicate, most-recent, incoming or existing.
    #[arg(long, value_parser = parse_strategy)]
    strategy: Option<Resolution>,
    /// Accept migration, fixture replacement and the backup export.
    #[arg(short, long)]
    yes:      bool,
  },

  /// Write a backup of a campaign (default: the last opened).
  Export {
    campaign_id: Option<String>,
    /// Directory to write into instead of `export_dir`.
    #[arg(long)]
    out:         Option<PathBuf>,
  },

  /// Search the last opened campaign.
  Search {
    query: String,
    /// Search NPCs only; an empty query lists them all.
    #[arg(long)]
    npcs:  bool,
  },

  /// Delete a campaign.
  Delete { campaign_id: String },

  /// Generate an item passphrase unused in the last opened campaign.
  Passphrase,
}

fn parse_strategy(s: &str) -> Result<Resolution, String> {
  s.parse::<Resolution>()
    .map_err(|_| format!("unknown strategy {s:?}; expected duplicate, most-recent, incoming or existing"))
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let config = Config::load(&cli.config)?;

  if let Some(parent) = config.store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    tokio::fs::create_dir_all(parent)
      .await
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }
  let storage = SqliteStore::open(&config.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", config.store_path))?;
  let mut store = CampaignStore::new(Arc::new(storage), Arc::new(RandomIds));

  match cli.command {
    Command::List => commands::list(&store).await,
    Command::Create { name, adventure_path, notes, tags } => {
      commands::create(&mut store, NewCampaign { name, adventure_path, notes, tags }).await
    }
    Command::Import { file, merge, copy, strategy, yes } => {
      let action = match (merge, copy) {
        (true, _) => Some(ImportAction::Merge),
        (_, true) => Some(ImportAction::NewCopy),
        _ => None,
      };
      if action.is_some() || strategy.is_some() || yes {
        let mut answers = Unattended { action, strategy: strategy.unwrap_or_default(), yes };
        commands::import(&mut store, &config, &mut answers, &file).await
      } else {
        commands::import(&mut store, &config, &mut Terminal::stdio(), &file).await
      }
    }
    Command::Export { campaign_id, out } => {
      commands::export(&mut store, &config, campaign_id.as_deref(), out.as_deref()).await
    }
    Command::Search { query, npcs } => commands::search(&mut store, &query, npcs).await,
    Command::Delete { campaign_id } => commands::delete(&mut store, &campaign_id).await,
    Command::Passphrase => commands::generate_passphrase(&mut store).await,
  }
}
