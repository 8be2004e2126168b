//! SQLite backend for the GM-Toolkit campaign store.
//!
//! Wraps [`tokio_rusqlite`] so database work runs on its own thread and never
//! blocks the async runtime.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
