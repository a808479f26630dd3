//! Release name <-> commit id correlation
//!
//! The map is never stored. It is derived from commit messages every time it
//! is needed, because history rewrites invalidate commit ids wholesale.

use crate::core::vcs::CommitRecord;
use std::collections::HashMap;
use tracing::warn;

/// Bidirectional mapping between release names and commit ids
#[derive(Debug, Default, Clone)]
pub struct Correlation {
  id_by_name: HashMap<String, String>,
  name_by_id: HashMap<String, String>,
}

impl Correlation {
  /// Build from a history listing (newest first)
  ///
  /// When several commits share a message the first one listed wins.
  pub fn rebuild(commits: &[CommitRecord]) -> Self {
    let mut correlation = Self::default();

    for commit in commits {
      if let Some(existing) = correlation.id_by_name.get(&commit.message) {
        if existing != &commit.id {
          warn!(
            message = %commit.message,
            kept = %existing,
            ignored = %commit.id,
            "duplicate commit message"
          );
        }
        continue;
      }
      correlation.id_by_name.insert(commit.message.clone(), commit.id.clone());
      correlation.name_by_id.insert(commit.id.clone(), commit.message.clone());
    }

    correlation
  }

  /// Record a commit created without rewriting history
  pub fn record(&mut self, name: &str, id: &str) {
    if let Some(old) = self.id_by_name.insert(name.to_string(), id.to_string()) {
      self.name_by_id.remove(&old);
    }
    self.name_by_id.insert(id.to_string(), name.to_string());
  }

  pub fn id_of(&self, name: &str) -> Option<&str> {
    self.id_by_name.get(name).map(String::as_str)
  }

  pub fn name_of(&self, id: &str) -> Option<&str> {
    self.name_by_id.get(id).map(String::as_str)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.id_by_name.contains_key(name)
  }

  pub fn len(&self) -> usize {
    self.id_by_name.len()
  }

  pub fn is_empty(&self) -> bool {
    self.id_by_name.is_empty()
  }
}
