//! SQL schema for the campaign store.

/// Full schema DDL; safe to run on every open.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per saved campaign. The payload is kept as the exact JSON text
-- the checksum was computed over.
CREATE TABLE IF NOT EXISTS campaigns (
    campaign_id    TEXT PRIMARY KEY,
    schema_version INTEGER NOT NULL,
    checksum_algo  TEXT NOT NULL,   -- 'sha-256'
    checksum       TEXT NOT NULL,   -- lowercase hex
    saved_at       TEXT NOT NULL,   -- ISO 8601 UTC
    payload_json   TEXT NOT NULL
);

-- Campaign index rows, in display order. Rewritten wholesale by save_index.
CREATE TABLE IF NOT EXISTS index_entries (
    position             INTEGER PRIMARY KEY,
    campaign_id          TEXT NOT NULL UNIQUE,
    name                 TEXT NOT NULL,
    adventure_path       TEXT,
    updated_at           TEXT,
    is_fixture           INTEGER NOT NULL DEFAULT 0,
    fixture_id           TEXT,
    fixture_label        TEXT,
    fixture_version_json TEXT        -- JSON; number or string
);

-- Single-row table for the index header.
CREATE TABLE IF NOT EXISTS index_meta (
    id                      INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version          INTEGER NOT NULL,
    last_opened_campaign_id TEXT
);

PRAGMA user_version = 1;
";
