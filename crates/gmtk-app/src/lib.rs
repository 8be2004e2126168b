//! Campaign services for GM-Toolkit: the campaign store, import, export and
//! schema migration.
//!
//! Everything here is generic over [`gmtk_core::store::CampaignStorage`];
//! user interaction during import goes through [`import::ImportPrompter`].

pub mod campaign_store;
pub mod error;
pub mod export;
pub mod import;
pub mod migration;

pub use campaign_store::CampaignStore;
pub use error::{Error, Result};

#[cfg(test)]
mod tests;
