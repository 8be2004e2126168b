//! Core types and algorithms for the GM-Toolkit campaign notebook.
//!
//! No database or terminal dependencies live here.
//! It holds the campaign data model, the storage trait, and the pure
//! import/merge machinery (conflict detection, resolution, ID remapping).

// `CampaignStorage` declares its futures `Send` through return-position
// `impl Future`; implementors still write plain `async fn`.
#![allow(async_fn_in_trait)]

pub mod backup;
pub mod collection;
pub mod conflict;
pub mod entity;
pub mod error;
pub mod ids;
pub mod merge;
pub mod passphrase;
pub mod payload;
pub mod search;
pub mod store;
pub mod tags;
pub mod timestamp;

pub use error::{Error, Result};
