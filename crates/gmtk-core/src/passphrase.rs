//! Thematic passphrases for item cards.
//!
//! A passphrase is two words (`"gilded sigil"`) or two words and a qualifier
//! (`"moonlit key of the deep"`), unique among the passphrases already used
//! in a campaign.

use std::collections::HashSet;

use rand_core::RngCore;
use serde::Serialize;

pub const DEFAULT_MAX_ATTEMPTS: usize = 10;

const ADJECTIVES: &[&str] = &[
  "ashen", "verdant", "gilded", "hollow", "veiled", "duskbound", "frostbitten", "radiant", "grave",
  "silent", "luminous", "iron", "arcane", "moonlit", "winter",
];

const NOUNS: &[&str] = &[
  "key", "sigil", "oath", "lantern", "crown", "blade", "covenant", "ember", "relic", "mirror",
  "seal", "chalice", "glyph", "veil", "token",
];

const QUALIFIERS: &[&str] = &[
  "of dusk",
  "of ash",
  "of winter",
  "of glass",
  "of storms",
  "of iron",
  "of embers",
  "of the deep",
  "of the veil",
];

const TWO_WORDS: (usize, usize) = (8, 20);
const THREE_WORDS: (usize, usize) = (12, 28);

const ROMAN: &[&str] = &["ii", "iii", "iv", "v", "vi", "vii", "viii", "ix", "x"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedPassphrase {
  pub passphrase: String,
  /// Set when every random attempt collided and a numbered variant was used
  /// instead.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub adjusted:   Option<String>,
}

/// Lowercased, inner whitespace collapsed to single spaces, trimmed.
pub fn normalize_passphrase(value: &str) -> String {
  value.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn pick<'a, R: RngCore>(rng: &mut R, list: &[&'a str]) -> &'a str {
  list[rng.next_u32() as usize % list.len()]
}

fn build_phrase<R: RngCore>(rng: &mut R, qualified: bool) -> String {
  let adjective = pick(rng, ADJECTIVES);
  let noun = pick(rng, NOUNS);
  let phrase = if qualified {
    format!("{adjective} {noun} {}", pick(rng, QUALIFIERS))
  } else {
    format!("{adjective} {noun}")
  };
  normalize_passphrase(&phrase)
}

fn length_ok(phrase: &str, qualified: bool) -> bool {
  let (min, max) = if qualified { THREE_WORDS } else { TWO_WORDS };
  (min..=max).contains(&phrase.len())
}

fn numeral(n: usize) -> String {
  ROMAN.get(n - 2).map_or_else(|| n.to_string(), |s| (*s).to_owned())
}

/// A passphrase not present (after normalisation) in `existing`.
///
/// Tries up to `max_attempts` random phrases; if all of them collide or fall
/// outside their length window, a base phrase is suffixed `-ii`, `-iii`, ...
/// until unused and the result is flagged as adjusted.
pub fn generate_unique_passphrase<R, I, S>(rng: &mut R, existing: I, max_attempts: usize) -> GeneratedPassphrase
where
  R: RngCore,
  I: IntoIterator<Item = S>,
  S: AsRef<str>,
{
  let used: HashSet<String> = existing
    .into_iter()
    .map(|p| normalize_passphrase(p.as_ref()))
    .filter(|p| !p.is_empty())
    .collect();

  for _ in 0..max_attempts {
    let qualified = rng.next_u32() & 1 == 1;
    let phrase = build_phrase(rng, qualified);
    if length_ok(&phrase, qualified) && !used.contains(&phrase) {
      return GeneratedPassphrase { passphrase: phrase, adjusted: None };
    }
  }

  let mut base = build_phrase(rng, false);
  if !length_ok(&base, false) {
    base = build_phrase(rng, true);
  }
  let mut n = 2;
  let mut candidate = format!("{base}-{}", numeral(n));
  while used.contains(&candidate) {
    n += 1;
    candidate = format!("{base}-{}", numeral(n));
  }

  GeneratedPassphrase {
    adjusted: Some(format!("Passphrase adjusted to avoid duplicates: \"{candidate}\".")),
    passphrase: candidate,
  }
}
