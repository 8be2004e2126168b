//! Import prompters: one that asks on the terminal, one that answers from
//! command-line flags.

use std::io::{self, BufRead, Write};

use gmtk_app::import::{ConflictChoice, DryRunSummary, ImportAction, ImportPrompter};
use gmtk_core::{
  backup::BackupDocument,
  conflict::{ConflictRecord, Resolution},
};

// ─── Terminal ─────────────────────────────────────────────────────────────────

/// Asks each question on `output` and reads the answer from `input`.
/// End of input cancels whatever was being asked.
pub struct Terminal<R, W> {
  input:  R,
  output: W,
}

impl Terminal<io::StdinLock<'static>, io::Stdout> {
  pub fn stdio() -> Self { Self::new(io::stdin().lock(), io::stdout()) }
}

impl<R: BufRead, W: Write> Terminal<R, W> {
  pub fn new(input: R, output: W) -> Self { Self { input, output } }

  fn say(&mut self, line: &str) {
    // A closed stdout leaves nothing to report to.
    let _ = writeln!(self.output, "{line}");
  }

  /// Lowercased, trimmed answer; `None` at end of input.
  fn ask(&mut self, question: &str) -> Option<String> {
    let _ = write!(self.output, "{question} ");
    let _ = self.output.flush();
    let mut line = String::new();
    match self.input.read_line(&mut line) {
      Ok(0) | Err(_) => None,
      Ok(_) => Some(line.trim().to_lowercase()),
    }
  }

  fn confirm(&mut self, question: &str) -> bool {
    matches!(self.ask(&format!("{question} [y/N]")).as_deref(), Some("y" | "yes"))
  }

  fn ask_resolution(&mut self, question: &str) -> Option<Resolution> {
    loop {
      match self.ask(question)?.as_str() {
        "d" | "duplicate" => return Some(Resolution::Duplicate),
        "r" | "recent" | "most-recent" => return Some(Resolution::MostRecent),
        "i" | "incoming" => return Some(Resolution::Incoming),
        "e" | "existing" => return Some(Resolution::Existing),
        _ => self.say("Answer d, r, i or e."),
      }
    }
  }
}

fn describe(conflict: &ConflictRecord) -> String {
  let collection = conflict.collection.map(|c| c.key()).unwrap_or("entity");
  let name = conflict.incoming.display_name().unwrap_or("unnamed");
  format!("{collection} {} \"{name}\"", conflict.id)
}

impl<R: BufRead, W: Write> ImportPrompter for Terminal<R, W> {
  fn confirm_migration(&mut self, incoming_version: u32, current_version: u32) -> bool {
    self.confirm(&format!(
      "Backup uses schema {incoming_version}; migrate it to schema {current_version}?"
    ))
  }

  fn confirm_fixture_replace(&mut self, backup: &BackupDocument) -> bool {
    let label = backup.fixture_label.as_deref().unwrap_or(backup.label());
    self.confirm(&format!("Replace stored fixtures with \"{label}\"?"))
  }

  fn choose_action(&mut self, summary: &DryRunSummary) -> ImportAction {
    self.say(&format!("Campaign: {} ({})", summary.campaign_label, summary.campaign_id));
    self.say(&format!(
      "New: {}  Updated: {}  Conflicts: {}",
      summary.new_count,
      summary.update_count,
      summary.conflicts.len()
    ));

    let question = if summary.can_merge {
      "[m]erge, [n]ew copy or [c]ancel?"
    } else {
      "No campaign with this ID. [n]ew copy or [c]ancel?"
    };
    loop {
      let Some(answer) = self.ask(question) else {
        return ImportAction::Cancel;
      };
      match answer.as_str() {
        "m" | "merge" if summary.can_merge => return ImportAction::Merge,
        "n" | "new" | "copy" => return ImportAction::NewCopy,
        "c" | "cancel" => return ImportAction::Cancel,
        _ => self.say("Unrecognised answer."),
      }
    }
  }

  fn resolve_conflicts(&mut self, conflicts: &[ConflictRecord]) -> Option<ConflictChoice> {
    for conflict in conflicts {
      self.say(&format!("  {}", describe(conflict)));
    }
    loop {
      let answer = self.ask(
        "Resolve all with [d]uplicate, most [r]ecent, [i]ncoming, [e]xisting; [p]ick each; or [c]ancel?",
      )?;
      let all = match answer.as_str() {
        "d" | "duplicate" => Resolution::Duplicate,
        "r" | "recent" | "most-recent" => Resolution::MostRecent,
        "i" | "incoming" => Resolution::Incoming,
        "e" | "existing" => Resolution::Existing,
        "c" | "cancel" => return None,
        "p" | "pick" => break,
        _ => {
          self.say("Unrecognised answer.");
          continue;
        }
      };
      return Some(ConflictChoice::All(all));
    }

    let mut records = conflicts.to_vec();
    for record in &mut records {
      let question = format!("{} [d/r/i/e]?", describe(record));
      record.resolution = Some(self.ask_resolution(&question)?);
    }
    Some(ConflictChoice::Each(records))
  }

  fn offer_export(&mut self, campaign_id: &str) -> bool {
    self.confirm(&format!("Export a backup of {campaign_id} now?"))
  }
}

// ─── Unattended ───────────────────────────────────────────────────────────────

/// Answers from `--merge` / `--copy` / `--strategy` / `--yes`.
#[derive(Debug, Clone, Copy)]
pub struct Unattended {
  /// `None` merges when possible and copies otherwise.
  pub action:   Option<ImportAction>,
  pub strategy: Resolution,
  /// Also accept the migration, fixture replacement and export offer.
  pub yes:      bool,
}

impl ImportPrompter for Unattended {
  fn confirm_migration(&mut self, _incoming: u32, _current: u32) -> bool { self.yes }

  fn confirm_fixture_replace(&mut self, _backup: &BackupDocument) -> bool { self.yes }

  fn choose_action(&mut self, summary: &DryRunSummary) -> ImportAction {
    match self.action {
      Some(action) => action,
      None if summary.can_merge => ImportAction::Merge,
      None => ImportAction::NewCopy,
    }
  }

  fn resolve_conflicts(&mut self, _conflicts: &[ConflictRecord]) -> Option<ConflictChoice> {
    Some(ConflictChoice::All(self.strategy))
  }

  fn offer_export(&mut self, _campaign_id: &str) -> bool { self.yes }
}

#[cfg(test)]
mod tests {
  use std::io::Cursor;

  use gmtk_core::{collection::Collection, entity::Entity};

  use super::*;

  fn terminal(input: &str) -> Terminal<Cursor<Vec<u8>>, Vec<u8>> {
    Terminal::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
  }

  fn conflict(id: &str, name: &str) -> ConflictRecord {
    let existing = Entity::new(id, "cmp_1", "2024-01-01T00:00:00.000Z").with_field("name", "old");
    let incoming = existing.clone().with_field("name", name);
    ConflictRecord { collection: Some(Collection::Npcs), ..ConflictRecord::new("npc", id, incoming, existing) }
  }

  fn summary(can_merge: bool) -> DryRunSummary {
    DryRunSummary { campaign_id: "cmp_1".into(), can_merge, ..DryRunSummary::default() }
  }

  #[test]
  fn confirm_needs_explicit_yes() {
    assert!(terminal("y\n").confirm_migration(0, 1));
    assert!(terminal(" YES \n").confirm_migration(0, 1));
    assert!(!terminal("\n").confirm_migration(0, 1));
    assert!(!terminal("").confirm_migration(0, 1));
  }

  #[test]
  fn merge_is_refused_without_target() {
    let mut t = terminal("m\nn\n");
    assert_eq!(t.choose_action(&summary(false)), ImportAction::NewCopy);
    let shown = String::from_utf8(t.output).unwrap();
    assert!(shown.contains("Unrecognised answer."));

    assert_eq!(terminal("merge\n").choose_action(&summary(true)), ImportAction::Merge);
    assert_eq!(terminal("").choose_action(&summary(true)), ImportAction::Cancel);
  }

  #[test]
  fn bulk_and_per_conflict_resolution() {
    let conflicts = [conflict("npc_1", "Bob"), conflict("npc_2", "Carl")];

    assert_eq!(
      terminal("r\n").resolve_conflicts(&conflicts),
      Some(ConflictChoice::All(Resolution::MostRecent))
    );
    assert_eq!(terminal("c\n").resolve_conflicts(&conflicts), None);

    let Some(ConflictChoice::Each(records)) = terminal("p\ni\nx\ne\n").resolve_conflicts(&conflicts) else {
      panic!("expected per-conflict answers");
    };
    assert_eq!(records[0].resolution, Some(Resolution::Incoming));
    assert_eq!(records[1].resolution, Some(Resolution::Existing));

    assert_eq!(terminal("p\ni\n").resolve_conflicts(&conflicts), None);
  }

  #[test]
  fn unattended_defaults_follow_target() {
    let mut answers = Unattended { action: None, strategy: Resolution::Incoming, yes: false };
    assert_eq!(answers.choose_action(&summary(true)), ImportAction::Merge);
    assert_eq!(answers.choose_action(&summary(false)), ImportAction::NewCopy);
    assert_eq!(answers.resolve_conflicts(&[]), Some(ConflictChoice::All(Resolution::Incoming)));
    assert!(!answers.confirm_migration(0, 1));
    assert!(!answers.offer_export("cmp_1"));
  }
}
