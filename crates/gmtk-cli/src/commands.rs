//! Subcommand implementations. Each prints its result to stdout.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use gmtk_app::{
  CampaignStore,
  campaign_store::NewCampaign,
  export::{Export, export_campaign},
  import::{ImportOutcome, ImportPrompter, Importer},
};
use gmtk_core::{passphrase, store::CampaignStorage};
use rand_core::OsRng;
use tracing::info;

use crate::config::Config;

/// Load the last opened campaign, if the index names one that still exists.
pub async fn open_last<S: CampaignStorage>(store: &mut CampaignStore<S>) -> anyhow::Result<bool> {
  let index = store.load_index().await?;
  let Some(id) = index.last_opened_campaign_id else {
    return Ok(false);
  };
  Ok(store.load_campaign(&id).await?.is_some())
}

pub async fn list<S: CampaignStorage>(store: &CampaignStore<S>) -> anyhow::Result<()> {
  let index = store.load_index().await?;
  if index.campaigns.is_empty() {
    println!("No campaigns.");
    return Ok(());
  }
  for entry in &index.campaigns {
    let marker = if index.last_opened_campaign_id.as_deref() == Some(entry.campaign_id.as_str()) { "*" } else { " " };
    let mut line = format!("{marker} {}  {}", entry.campaign_id, entry.name);
    if let Some(path) = entry.adventure_path.as_deref().filter(|p| !p.is_empty()) {
      line.push_str(&format!("  [{path}]"));
    }
    if entry.is_fixture {
      line.push_str("  (fixture)");
    }
    println!("{line}");
  }
  Ok(())
}

pub async fn create<S: CampaignStorage>(store: &mut CampaignStore<S>, input: NewCampaign) -> anyhow::Result<()> {
  let id = store.create_campaign(input).await?;
  println!("Created {id}");
  Ok(())
}

pub async fn import<S, P>(
  store: &mut CampaignStore<S>,
  config: &Config,
  prompter: &mut P,
  file: &Path,
) -> anyhow::Result<()>
where
  S: CampaignStorage,
  P: ImportPrompter,
{
  let text = tokio::fs::read_to_string(file)
    .await
    .with_context(|| format!("failed to read {}", file.display()))?;

  let importer = Importer::default().with_duplicate_suffix(config.duplicate_suffix.as_str());
  let outcome = importer
    .import_text(store, prompter, &text)
    .await
    .with_context(|| format!("failed to import {}", file.display()))?;

  match outcome {
    ImportOutcome::Merged { campaign_id, conflicts, backup } => {
      println!("Merged into {campaign_id} ({conflicts} conflicts resolved)");
      write_backup(config, backup).await?;
    }
    ImportOutcome::Copied { campaign_id, orphaned_references, backup } => {
      println!("Imported as {campaign_id}");
      for orphan in &orphaned_references {
        println!(
          "  unresolved reference: {} {} {} -> {}",
          orphan.collection, orphan.entity_id, orphan.field, orphan.ref_id
        );
      }
      write_backup(config, backup).await?;
    }
    ImportOutcome::FixtureReplaced { campaign_id, replaced } => {
      println!("Fixture imported as {campaign_id}");
      if !replaced.is_empty() {
        println!("  replaced: {}", replaced.join(", "));
      }
    }
    ImportOutcome::Cancelled => println!("Import cancelled."),
    ImportOutcome::MigrationDeclined { incoming_version } => {
      println!("Import stopped: schema {incoming_version} was not migrated.");
    }
  }
  Ok(())
}

async fn write_backup(config: &Config, backup: Option<Export>) -> anyhow::Result<()> {
  if let Some(export) = backup {
    let path = write_export(&config.export_dir, &export).await?;
    println!("Backup written to {}", path.display());
  }
  Ok(())
}

pub async fn export<S: CampaignStorage>(
  store: &mut CampaignStore<S>,
  config: &Config,
  campaign_id: Option<&str>,
  out: Option<&Path>,
) -> anyhow::Result<()> {
  if campaign_id.is_none() {
    open_last(store).await?;
  }
  let export = export_campaign(store, campaign_id).await?;
  let path = write_export(out.unwrap_or(&config.export_dir), &export).await?;
  println!("Exported to {}", path.display());
  Ok(())
}

/// Write `export` into `dir`, creating it if needed.
async fn write_export(dir: &Path, export: &Export) -> anyhow::Result<PathBuf> {
  tokio::fs::create_dir_all(dir)
    .await
    .with_context(|| format!("failed to create {}", dir.display()))?;
  let path = dir.join(&export.file_name);
  tokio::fs::write(&path, &export.contents)
    .await
    .with_context(|| format!("failed to write {}", path.display()))?;
  info!(path = %path.display(), "export written");
  Ok(path)
}

pub async fn search<S: CampaignStorage>(store: &mut CampaignStore<S>, query: &str, npcs: bool) -> anyhow::Result<()> {
  open_last(store).await?;
  let index = store.search_index().context("no campaign is open")?;

  if npcs {
    for npc in index.search_npcs(query) {
      let archived = if npc.is_archived { " (archived)" } else { "" };
      println!("{}  {}  {}{archived}", npc.id, npc.name, npc.role);
    }
    return Ok(());
  }

  let hits = index.search_global(query);
  if hits.is_empty() {
    println!("No matches.");
  }
  for doc in hits {
    let archived = if doc.is_archived { " (archived)" } else { "" };
    println!("{:<10} {}  {}{archived}", doc.kind.to_string(), doc.title, doc.meta);
  }
  Ok(())
}

pub async fn delete<S: CampaignStorage>(store: &mut CampaignStore<S>, campaign_id: &str) -> anyhow::Result<()> {
  let next = store.delete_campaign(campaign_id).await?;
  println!("Deleted {campaign_id}");
  if let Some(next) = next {
    println!("Last opened is now {next}");
  }
  Ok(())
}

pub async fn generate_passphrase<S: CampaignStorage>(store: &mut CampaignStore<S>) -> anyhow::Result<()> {
  let generated = if open_last(store).await? {
    store.generate_item_passphrase(&mut OsRng)?
  } else {
    passphrase::generate_unique_passphrase(
      &mut OsRng,
      std::iter::empty::<&str>(),
      passphrase::DEFAULT_MAX_ATTEMPTS,
    )
  };
  println!("{}", generated.passphrase);
  if let Some(message) = generated.adjusted {
    eprintln!("{message}");
  }
  Ok(())
}
