//! Tag and free-text helpers.

/// Trimmed and lowercased.
pub fn normalize_tag(tag: &str) -> String { tag.trim().to_lowercase() }

/// Normalised, with empties and repeats dropped. First occurrence wins the
/// position.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
  I: IntoIterator<Item = S>,
  S: AsRef<str>,
{
  let mut out: Vec<String> = Vec::new();
  for tag in tags {
    let tag = normalize_tag(tag.as_ref());
    if !tag.is_empty() && !out.contains(&tag) {
      out.push(tag);
    }
  }
  out
}

/// Case-insensitive substring test.
pub fn matches_text(haystack: &str, query: &str) -> bool {
  haystack.to_lowercase().contains(&query.to_lowercase())
}
