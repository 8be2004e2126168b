//! Schema migration for imported backups.

use gmtk_core::{backup::CURRENT_SCHEMA_VERSION, payload::CampaignPayload};

/// Brings payloads written by older builds up to the current schema.
pub trait Migrator {
  /// The schema version payloads are migrated to.
  fn current_version(&self) -> u32 { CURRENT_SCHEMA_VERSION }

  fn needs_migration(&self, version: u32) -> bool { version < self.current_version() }

  fn migrate_payload(&self, version: u32, payload: CampaignPayload) -> CampaignPayload;
}

/// Migrations for the schemas this build knows. Schema 1 is the first, so
/// there is nothing to transform yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaMigrator;

impl Migrator for SchemaMigrator {
  fn migrate_payload(&self, _version: u32, payload: CampaignPayload) -> CampaignPayload { payload }
}
