//! History store abstraction
//!
//! The engine only ever talks to version control through [`HistoryStore`].
//! Every method is one blocking primitive; nothing here retries.

#[cfg(test)]
pub(crate) mod memory;
pub mod system_git;
mod system_git_ops;

pub use system_git::SystemGit;

use crate::core::error::ReplayResult;
use chrono::{DateTime, Utc};
use std::path::Path;

/// Message of the baseline commit created by [`HistoryStore::init`] callers
pub const BASELINE_MESSAGE: &str = "Initial commit";

/// Branch holding the baseline commit in a fresh repository
pub const BASELINE_BRANCH: &str = "main";

/// A commit as seen by the correlation scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
  pub id: String,
  pub message: String,
}

/// Information about a commit, used when rewriting history
#[derive(Debug, Clone)]
pub struct CommitInfo {
  pub sha: String,
  pub author: String,
  pub author_email: String,
  pub committer: String,
  pub committer_email: String,
  pub message: String,
  pub timestamp: i64,
  pub committer_timestamp: i64,
  pub parent_shas: Vec<String>,
}

/// Primitive operations over an external version control system
pub trait HistoryStore {
  /// Working tree the commit body writes into
  fn work_tree(&self) -> &Path;

  /// True once the repository exists
  fn is_initialized(&self) -> bool;

  /// Create an empty repository
  fn init(&self) -> ReplayResult<()>;

  /// Stage everything in the working tree and commit it; returns the new id
  fn commit_all(&self, message: &str, timestamp: DateTime<Utc>) -> ReplayResult<String>;

  /// Create a branch at `from`, or at HEAD when `from` is None
  fn create_branch(&self, name: &str, from: Option<&str>) -> ReplayResult<()>;

  fn delete_branch(&self, name: &str) -> ReplayResult<()>;

  fn branch_exists(&self, name: &str) -> ReplayResult<bool>;

  /// Check out a branch, discarding working tree changes
  fn checkout(&self, name: &str) -> ReplayResult<()>;

  fn resolve_branch_head(&self, name: &str) -> ReplayResult<String>;

  /// Re-parent `from`, a commit on `target`, onto `base`'s head
  ///
  /// `from` and everything descending from it on any branch is rewritten with
  /// its content unchanged, and the affected branch refs move to the rewritten
  /// heads. Commits that do not descend from `from` are left alone.
  fn rebase_onto(&self, base: &str, target: &str, from: &str) -> ReplayResult<()>;

  /// Every commit reachable from a local branch, newest first
  fn list_commits(&self) -> ReplayResult<Vec<CommitRecord>>;
}
