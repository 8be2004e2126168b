//! Prefixed identifier generation.
//!
//! Every entity ID has the shape `<prefix>_<unique>`, where the prefix names
//! the collection (`npc`, `crt`, `enc`, ...). Generation sits behind the
//! [`IdGenerator`] trait so merge and remap logic can run against a
//! deterministic sequence in tests.

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

/// Prefix used when the caller has nothing better.
pub const DEFAULT_PREFIX: &str = "id";

/// Prefix for campaign IDs.
pub const CAMPAIGN_PREFIX: &str = "cmp";

/// A source of fresh, prefixed identifiers.
pub trait IdGenerator: Send + Sync {
  /// Return a new identifier of the form `<prefix>_<unique>`.
  fn next(&self, prefix: &str) -> String;
}

/// Random UUID v4 identifiers. The production generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
  fn next(&self, prefix: &str) -> String { format!("{prefix}_{}", Uuid::new_v4()) }
}

/// Counter-based identifiers: `npc_1`, `crt_2`, ...
///
/// The counter is shared across prefixes, so every generated ID is unique
/// within one generator.
#[derive(Debug, Default)]
pub struct SequentialIds {
  counter: AtomicU64,
}

impl SequentialIds {
  pub fn new() -> Self { Self::default() }

  /// Start counting after `n`; the next ID ends in `n + 1`.
  pub fn starting_after(n: u64) -> Self {
    Self { counter: AtomicU64::new(n) }
  }
}

impl IdGenerator for SequentialIds {
  fn next(&self, prefix: &str) -> String {
    let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
    format!("{prefix}_{n}")
  }
}

/// The part of an ID before the first underscore, or `"entity"` when empty.
pub fn id_prefix(id: &str) -> &str {
  match id.split('_').next() {
    Some(prefix) if !prefix.is_empty() => prefix,
    _ => "entity",
  }
}
