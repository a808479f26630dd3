//! Replays a version tree onto a history store
//!
//! Releases are processed in [`VersionTree::flatten`] order. A release whose
//! name already matches a commit message is skipped, so re-running against the
//! same repository performs no mutations.
//!
//! A new release either extends its branch or is inserted below commits that
//! already exist. Insertion re-parents exactly the committed releases the
//! tree places directly below the new one, together with their descendants:
//!
//! ```text
//! before:  P -> C1 -> C2          (branch)
//! commit:  P -> X                 (temporary branch)
//! rebase:  P -> X -> C1' -> C2'   (branch)
//! ```
//!
//! Commits on the parent's branch above `P` keep their ids. Every id
//! downstream of `X` changes, so the correlation map is rebuilt from the store
//! after each rebase.

use crate::core::correlation::Correlation;
use crate::core::error::{ReplayError, ReplayResult};
use crate::core::vcs::{BASELINE_MESSAGE, HistoryStore};
use crate::graph::VersionTree;
use crate::release::workspace::{IGNORE_FILE, IGNORE_RULES, Workspace, write_marker};
use crate::release::{Release, ReleaseSource, Translator, sync_working_tree};
use crate::ui::progress::CommitProgress;
use petgraph::graph::NodeIndex;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use tracing::{debug, error, info, warn};

/// Branch holding a release while it is inserted below existing commits
pub const INSERT_BRANCH: &str = "release-replay/insert";

/// What happened to one committed release
#[derive(Debug, Clone, Serialize)]
pub struct ReplayedRelease {
  pub name: String,
  pub branch: String,
  pub parent: String,
  /// True when existing history was rewritten on top of this release
  pub inserted: bool,
}

/// A release whose extraction failed
#[derive(Debug, Clone, Serialize)]
pub struct FailedRelease {
  pub name: String,
  pub reason: String,
}

/// Outcome of one replay run
#[derive(Debug, Default, Clone, Serialize)]
pub struct ReplaySummary {
  pub committed: Vec<ReplayedRelease>,
  /// Releases already present in the repository
  pub already_present: usize,
  pub failed: Vec<FailedRelease>,
  /// Descendants of failed releases, left for a later run
  pub blocked: Vec<String>,
  /// Insertions that rewrote existing history
  pub rescans: usize,
}

impl ReplaySummary {
  pub fn inserted(&self) -> usize {
    self.committed.iter().filter(|r| r.inserted).count()
  }

  pub fn is_clean(&self) -> bool {
    self.failed.is_empty() && self.blocked.is_empty()
  }
}

/// Maps a [`VersionTree`] onto a [`HistoryStore`]
pub struct ReconstructionEngine<'a> {
  store: &'a dyn HistoryStore,
  source: &'a dyn ReleaseSource,
  translators: Vec<&'a dyn Translator>,
  keep_going: bool,
  show_progress: bool,
}

impl<'a> ReconstructionEngine<'a> {
  pub fn new(store: &'a dyn HistoryStore, source: &'a dyn ReleaseSource) -> Self {
    Self {
      store,
      source,
      translators: Vec::new(),
      keep_going: false,
      show_progress: false,
    }
  }

  pub fn with_translator(mut self, translator: &'a dyn Translator) -> Self {
    self.translators.push(translator);
    self
  }

  /// Continue with unrelated releases after an extraction failure
  pub fn keep_going(mut self, keep_going: bool) -> Self {
    self.keep_going = keep_going;
    self
  }

  pub fn show_progress(mut self, show_progress: bool) -> Self {
    self.show_progress = show_progress;
    self
  }

  /// Commit every release of `tree` that the store does not hold yet
  ///
  /// `correlation` is replaced by a fresh scan of the store before anything
  /// else happens and kept current throughout the run.
  pub fn run(&self, tree: &VersionTree, correlation: &mut Correlation) -> ReplayResult<ReplaySummary> {
    *correlation = Correlation::rebuild(&self.store.list_commits()?);

    let order = tree.flatten();
    let mut progress = self.show_progress.then(|| CommitProgress::new(order.len(), "Replaying releases"));
    let mut summary = ReplaySummary::default();
    let mut unavailable: HashSet<NodeIndex> = HashSet::new();

    for idx in order {
      if correlation.contains(&tree.release(idx).name) {
        debug!(release = %tree.release(idx).name, "already committed");
        summary.already_present += 1;
      } else {
        self.ensure_committed(tree, idx, correlation, &mut unavailable, &mut summary)?;
      }

      if let Some(progress) = progress.as_mut() {
        progress.inc();
      }
    }

    info!(
      committed = summary.committed.len(),
      inserted = summary.inserted(),
      present = summary.already_present,
      failed = summary.failed.len(),
      "replay finished"
    );
    Ok(summary)
  }

  /// Commit `idx` after any of its ancestors that are still missing
  ///
  /// The correlation map doubles as the memo: a release is committed at most
  /// once no matter how many descendants ask for it.
  fn ensure_committed(
    &self,
    tree: &VersionTree,
    idx: NodeIndex,
    correlation: &mut Correlation,
    unavailable: &mut HashSet<NodeIndex>,
    summary: &mut ReplaySummary,
  ) -> ReplayResult<()> {
    let mut pending = Vec::new();
    let mut cursor = Some(idx);
    while let Some(current) = cursor {
      if correlation.contains(&tree.release(current).name) {
        break;
      }
      if unavailable.contains(&current) {
        for blocked in pending {
          unavailable.insert(blocked);
          summary.blocked.push(tree.release(blocked).name.clone());
        }
        return Ok(());
      }
      pending.push(current);
      cursor = tree.parent(current);
    }

    for current in pending.into_iter().rev() {
      if unavailable.contains(&current) {
        summary.blocked.push(tree.release(current).name.clone());
        continue;
      }
      match self.commit_release(tree, current, correlation) {
        Ok(replayed) => {
          if replayed.inserted {
            summary.rescans += 1;
          }
          summary.committed.push(replayed);
        }
        Err(e) if e.is_extraction() && self.keep_going => {
          let name = tree.release(current).name.clone();
          warn!(release = %name, error = %e, "extraction failed, skipping descendants");
          summary.failed.push(FailedRelease {
            name,
            reason: e.to_string(),
          });
          // Everything still pending below descends from this release
          unavailable.insert(current);
          let mut below = Some(idx);
          while let Some(node) = below
            && node != current
          {
            unavailable.insert(node);
            below = tree.parent(node);
          }
        }
        Err(e) => return Err(e),
      }
    }
    Ok(())
  }

  fn commit_release(
    &self,
    tree: &VersionTree,
    idx: NodeIndex,
    correlation: &mut Correlation,
  ) -> ReplayResult<ReplayedRelease> {
    let node = tree.node(idx);
    let release = &node.release;

    // Extract before touching the store so a bad artifact changes nothing
    let workspace = self.prepare(release)?;

    let parent = match tree.parent(idx) {
      Some(parent) => tree.release(parent).name.clone(),
      None => {
        if !self.store.is_initialized() {
          let id = self.init_repository(release)?;
          correlation.record(BASELINE_MESSAGE, &id);
        }
        BASELINE_MESSAGE.to_string()
      }
    };

    let parent_id = correlation.id_of(&parent).map(str::to_string).ok_or_else(|| {
      ReplayError::with_help(
        format!("Parent '{}' of release '{}' has no commit", parent, release.name),
        "The repository was not created by release-replay, or its baseline commit was removed",
      )
    })?;

    // Committed releases the tree now places below this one
    let adopted: Vec<NodeIndex> = tree
      .children(idx)
      .into_iter()
      .filter(|child| correlation.contains(&tree.release(*child).name))
      .collect();

    if !self.store.branch_exists(&node.branch)? {
      self.store.create_branch(&node.branch, Some(&parent_id))?;
    }
    let at_tip = self.store.resolve_branch_head(&node.branch)? == parent_id;

    if !at_tip && !adopted.iter().any(|child| tree.node(*child).branch == node.branch) {
      return Err(ReplayError::with_help(
        format!(
          "Branch '{}' has moved past '{}' but no committed release on it descends from '{}'",
          node.branch, parent, release.name
        ),
        "Check policy.parents for overrides that detach releases from their branch",
      ));
    }

    if adopted.is_empty() {
      self.store.checkout(&node.branch)?;
      let id = self.commit_workspace(release, &workspace)?;
      correlation.record(&release.name, &id);
    } else {
      info!(release = %release.name, branch = %node.branch, parent = %parent, "inserting below existing commits");
      let base = if at_tip { node.branch.as_str() } else { INSERT_BRANCH };
      self.insert(tree, release, &workspace, &parent_id, base, &node.branch, &adopted, correlation)?;
    }

    Ok(ReplayedRelease {
      name: release.name.clone(),
      branch: node.branch.clone(),
      parent,
      inserted: !adopted.is_empty(),
    })
  }

  /// Create the repository with its baseline commit on the default branch
  fn init_repository(&self, root: &Release) -> ReplayResult<String> {
    info!(path = %self.store.work_tree().display(), "initializing repository");
    self.store.init()?;
    fs::write(self.store.work_tree().join(IGNORE_FILE), IGNORE_RULES)?;
    self.store.commit_all(BASELINE_MESSAGE, root.release_time)
  }

  /// Commit on `base`, then move each adopted release onto the new commit
  ///
  /// `base` is either the release's own branch, when its tip is the parent,
  /// or a temporary branch at `parent_id`. The temporary branch is deleted on
  /// every path, including a failed rebase.
  #[allow(clippy::too_many_arguments)]
  fn insert(
    &self,
    tree: &VersionTree,
    release: &Release,
    workspace: &Workspace,
    parent_id: &str,
    base: &str,
    branch: &str,
    adopted: &[NodeIndex],
    correlation: &mut Correlation,
  ) -> ReplayResult<()> {
    if base == branch {
      return self.commit_and_rebase(tree, release, workspace, base, adopted, correlation);
    }

    if self.store.branch_exists(INSERT_BRANCH)? {
      warn!(branch = INSERT_BRANCH, "removing stale temporary branch");
      self.store.checkout(branch)?;
      self.store.delete_branch(INSERT_BRANCH)?;
    }

    self.store.create_branch(INSERT_BRANCH, Some(parent_id))?;
    let result = self.commit_and_rebase(tree, release, workspace, base, adopted, correlation);

    let cleanup = self
      .store
      .checkout(branch)
      .and_then(|()| self.store.delete_branch(INSERT_BRANCH));

    match (result, cleanup) {
      (Err(e), Err(cleanup)) => {
        warn!(branch = INSERT_BRANCH, error = %cleanup, "failed to delete temporary branch");
        Err(e)
      }
      (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
      (Ok(()), Ok(())) => Ok(()),
    }
  }

  /// Ids change with every rewrite, so each adopted release is looked up in a
  /// fresh scan
  fn commit_and_rebase(
    &self,
    tree: &VersionTree,
    release: &Release,
    workspace: &Workspace,
    base: &str,
    adopted: &[NodeIndex],
    correlation: &mut Correlation,
  ) -> ReplayResult<()> {
    self.store.checkout(base)?;
    let id = self.commit_workspace(release, workspace)?;
    correlation.record(&release.name, &id);

    for &child in adopted {
      let node = tree.node(child);
      let from = correlation
        .id_of(&node.release.name)
        .map(str::to_string)
        .ok_or_else(|| ReplayError::message(format!("Release '{}' lost its commit", node.release.name)))?;
      self.store.rebase_onto(base, &node.branch, &from).inspect_err(|e| {
        error!(branch = %node.branch, release = %release.name, error = %e, "rebase failed");
      })?;
      *correlation = Correlation::rebuild(&self.store.list_commits()?);
    }
    Ok(())
  }

  /// Extract and translate a release into a fresh workspace
  fn prepare(&self, release: &Release) -> ReplayResult<Workspace> {
    let workspace = Workspace::new()?;
    self.source.extract_into(release, workspace.path())?;
    for translator in &self.translators {
      translator.translate_workspace(workspace.path())?;
    }
    Ok(workspace)
  }

  /// Mirror the workspace into the checked out tree and commit it
  fn commit_workspace(&self, release: &Release, workspace: &Workspace) -> ReplayResult<String> {
    let work_tree = self.store.work_tree();
    let stats = sync_working_tree(work_tree, workspace.path())?;
    write_marker(work_tree, &release.name)?;
    let id = self.store.commit_all(&release.name, release.release_time)?;

    info!(
      release = %release.name,
      written = stats.written,
      removed = stats.removed,
      unchanged = stats.unchanged,
      "committed"
    );
    Ok(id)
  }
}
