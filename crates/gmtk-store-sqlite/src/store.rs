//! [`SqliteStore`], the SQLite implementation of [`CampaignStorage`].

use std::path::Path;

use gmtk_core::{
  backup::CURRENT_SCHEMA_VERSION,
  payload::CampaignPayload,
  store::{CHECKSUM_ALGO, CampaignIndex, CampaignStorage, Checksum, IndexEntry, StoredCampaign},
  timestamp,
};
use rusqlite::OptionalExtension as _;
use tracing::warn;

use crate::{
  Result,
  encode::{RawCampaign, RawIndexEntry, checksum, decode_schema_version, encode_fixture_version},
  error::Error,
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A campaign store backed by a single SQLite file.
///
/// Clones share one connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and initialise the schema.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// An empty in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run raw SQL against the store, bypassing every invariant.
  #[cfg(test)]
  pub(crate) async fn execute_raw(&self, sql: &'static str) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── CampaignStorage impl ────────────────────────────────────────────────────

impl CampaignStorage for SqliteStore {
  type Error = Error;

  // ── Index ─────────────────────────────────────────────────────────────────

  async fn load_index(&self) -> Result<CampaignIndex> {
    let (meta, raws): (Option<(i64, Option<String>)>, Vec<RawIndexEntry>) = self
      .conn
      .call(|conn| {
        let meta = conn
          .query_row(
            "SELECT schema_version, last_opened_campaign_id FROM index_meta WHERE id = 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
          )
          .optional()?;

        let mut stmt = conn.prepare(
          "SELECT campaign_id, name, adventure_path, updated_at, is_fixture,
                  fixture_id, fixture_label, fixture_version_json
           FROM index_entries ORDER BY position",
        )?;
        let raws = stmt
          .query_map([], |row| {
            Ok(RawIndexEntry {
              campaign_id:          row.get(0)?,
              name:                 row.get(1)?,
              adventure_path:       row.get(2)?,
              updated_at:           row.get(3)?,
              is_fixture:           row.get(4)?,
              fixture_id:           row.get(5)?,
              fixture_label:        row.get(6)?,
              fixture_version_json: row.get(7)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((meta, raws))
      })
      .await?;

    let Some((schema_version, last_opened_campaign_id)) = meta else {
      return Ok(CampaignIndex::default());
    };

    Ok(CampaignIndex {
      schema_version: decode_schema_version("index_meta.schema_version", schema_version)?,
      last_opened_campaign_id,
      campaigns: raws.into_iter().map(RawIndexEntry::into_entry).collect::<Result<_>>()?,
    })
  }

  async fn save_index(&self, index: CampaignIndex) -> Result<()> {
    let rows = index
      .campaigns
      .iter()
      .map(|e| Ok((e.clone(), encode_fixture_version(e.fixture_version.as_ref())?)))
      .collect::<Result<Vec<(IndexEntry, Option<String>)>>>()?;
    let schema_version = i64::from(index.schema_version);
    let last_opened = index.last_opened_campaign_id;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM index_entries", [])?;
        for (position, (entry, fixture_version_json)) in rows.into_iter().enumerate() {
          tx.execute(
            "INSERT INTO index_entries (
               position, campaign_id, name, adventure_path, updated_at,
               is_fixture, fixture_id, fixture_label, fixture_version_json
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
              position as i64,
              entry.campaign_id,
              entry.name,
              entry.adventure_path,
              entry.updated_at,
              entry.is_fixture,
              entry.fixture_id,
              entry.fixture_label,
              fixture_version_json,
            ],
          )?;
        }
        tx.execute(
          "INSERT INTO index_meta (id, schema_version, last_opened_campaign_id)
           VALUES (1, ?1, ?2)
           ON CONFLICT (id) DO UPDATE SET
             schema_version = excluded.schema_version,
             last_opened_campaign_id = excluded.last_opened_campaign_id",
          rusqlite::params![schema_version, last_opened],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Campaigns ─────────────────────────────────────────────────────────────

  async fn load_campaign(&self, campaign_id: &str) -> Result<Option<StoredCampaign>> {
    let id = campaign_id.to_owned();

    let raw: Option<RawCampaign> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT campaign_id, schema_version, checksum_algo, checksum, saved_at, payload_json
               FROM campaigns WHERE campaign_id = ?1",
              rusqlite::params![id],
              |row| {
                Ok(RawCampaign {
                  campaign_id:    row.get(0)?,
                  schema_version: row.get(1)?,
                  checksum_algo:  row.get(2)?,
                  checksum:       row.get(3)?,
                  saved_at:       row.get(4)?,
                  payload_json:   row.get(5)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    let stored = raw.map(RawCampaign::into_stored).transpose()?;
    if let Some(stored) = &stored
      && !stored.checksum_matches
    {
      warn!(campaign_id = %stored.campaign_id, "stored campaign checksum mismatch");
    }
    Ok(stored)
  }

  async fn save_campaign(&self, campaign_id: &str, payload: CampaignPayload) -> Result<StoredCampaign> {
    let payload_json = serde_json::to_string(&payload)?;
    let stored = StoredCampaign {
      schema_version:   CURRENT_SCHEMA_VERSION,
      campaign_id:      campaign_id.to_owned(),
      checksum:         Checksum {
        algo:  CHECKSUM_ALGO.to_owned(),
        value: checksum(&payload_json),
      },
      saved_at:         timestamp::now_iso(),
      payload,
      checksum_matches: true,
    };

    let id = stored.campaign_id.clone();
    let version = i64::from(stored.schema_version);
    let algo = stored.checksum.algo.clone();
    let value = stored.checksum.value.clone();
    let saved_at = stored.saved_at.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO campaigns (
             campaign_id, schema_version, checksum_algo, checksum, saved_at, payload_json
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT (campaign_id) DO UPDATE SET
             schema_version = excluded.schema_version,
             checksum_algo  = excluded.checksum_algo,
             checksum       = excluded.checksum,
             saved_at       = excluded.saved_at,
             payload_json   = excluded.payload_json",
          rusqlite::params![id, version, algo, value, saved_at, payload_json],
        )?;
        Ok(())
      })
      .await?;

    Ok(stored)
  }

  async fn delete_campaign(&self, campaign_id: &str) -> Result<()> {
    let id = campaign_id.to_owned();
    self
      .conn
      .call(move |conn| {
        conn.execute("DELETE FROM campaigns WHERE campaign_id = ?1", rusqlite::params![id])?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
