//! Replay plans: what a run would do, computed without touching the store
//!
//! A pending release is an insertion exactly when the tree places an already
//! committed release directly below it. Names survive history rewrites while
//! commit ids do not, so one pass over the replay order is enough to predict
//! every append and insertion.
//!
//! ```text
//! VersionTree + Correlation
//!   ↓
//! ReplayPlan (dry run, --json)
//!   ↓
//! ReconstructionEngine (--apply)
//! ```

use crate::core::correlation::Correlation;
use crate::core::error::ReplayResult;
use crate::core::vcs::{BASELINE_MESSAGE, HistoryStore};
use crate::graph::VersionTree;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Plan identifier (SHA256 hash of plan contents)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanId(String);

impl PlanId {
  /// Create a plan ID from plan contents
  pub fn from_contents(contents: &[u8]) -> Self {
    let mut hasher = Sha256::new();
    hasher.update(contents);
    let result = hasher.finalize();
    Self(format!("{:x}", result))
  }

  /// Get the short ID (first 12 characters)
  pub fn short(&self) -> &str {
    &self.0[..12.min(self.0.len())]
  }
}

impl fmt::Display for PlanId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.short())
  }
}

/// One step of a replay
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanAction {
  /// Create the repository and its baseline commit
  InitRepository { path: String },

  /// Commit on top of the parent
  Append {
    release: String,
    branch: String,
    parent: String,
  },

  /// Commit, then rewrite the existing releases that now descend from it
  Insert {
    release: String,
    branch: String,
    parent: String,
  },
}

impl PlanAction {
  pub fn release(&self) -> Option<&str> {
    match self {
      PlanAction::InitRepository { .. } => None,
      PlanAction::Append { release, .. } | PlanAction::Insert { release, .. } => Some(release),
    }
  }

  pub fn rewrites_history(&self) -> bool {
    matches!(self, PlanAction::Insert { .. })
  }
}

impl fmt::Display for PlanAction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PlanAction::InitRepository { path } => write!(f, "Initialize repository at {}", path),
      PlanAction::Append {
        release,
        branch,
        parent,
      } => write!(f, "Commit {} on {} (after {})", release, branch, parent),
      PlanAction::Insert {
        release,
        branch,
        parent,
      } => write!(f, "Insert {} into {} below existing commits (after {})", release, branch, parent),
    }
  }
}

/// The ordered actions of one replay run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayPlan {
  pub id: PlanId,
  pub actions: Vec<PlanAction>,
  /// Releases already committed
  pub already_present: usize,
}

impl ReplayPlan {
  /// Predict the engine's actions for `tree` against the current store state
  pub fn build(tree: &VersionTree, correlation: &Correlation, store: &dyn HistoryStore) -> ReplayResult<Self> {
    let mut actions = Vec::new();
    let mut already_present = 0;

    if !store.is_initialized() {
      actions.push(PlanAction::InitRepository {
        path: store.work_tree().display().to_string(),
      });
    }

    for idx in tree.flatten() {
      let node = tree.node(idx);
      if correlation.contains(&node.release.name) {
        already_present += 1;
        continue;
      }

      let parent = tree
        .parent(idx)
        .map(|p| tree.release(p).name.clone())
        .unwrap_or_else(|| BASELINE_MESSAGE.to_string());
      let release = node.release.name.clone();
      let branch = node.branch.clone();

      // Children come later in replay order, so only committed ones get rewritten
      let rewrites = tree
        .children(idx)
        .into_iter()
        .any(|child| correlation.contains(&tree.release(child).name));
      if rewrites {
        actions.push(PlanAction::Insert {
          release,
          branch,
          parent,
        });
      } else {
        actions.push(PlanAction::Append {
          release,
          branch,
          parent,
        });
      }
    }

    let mut plan = Self {
      id: PlanId::from_contents(&[]),
      actions,
      already_present,
    };
    plan.recompute_id();
    Ok(plan)
  }

  /// Recompute plan ID based on current contents
  fn recompute_id(&mut self) {
    let json = serde_json::to_vec(&self.actions).unwrap_or_default();
    self.id = PlanId::from_contents(&json);
  }

  /// Serialize to JSON
  pub fn to_json(&self) -> ReplayResult<String> {
    Ok(serde_json::to_string_pretty(self)?)
  }

  /// Number of releases the plan commits
  pub fn commits(&self) -> usize {
    self.actions.iter().filter(|a| a.release().is_some()).count()
  }

  pub fn insertions(&self) -> usize {
    self.actions.iter().filter(|a| a.rewrites_history()).count()
  }

  /// Get human-readable representation
  pub fn to_human_readable(&self) -> String {
    let mut output = String::new();

    output.push_str(&format!("📋 Plan: replay ({})\n", self.id));
    output.push_str(&format!(
      "   {} to commit, {} already committed\n",
      self.commits(),
      self.already_present
    ));

    if self.actions.is_empty() {
      output.push_str("\n   Nothing to do\n");
      return output;
    }

    output.push_str(&format!("\n   Actions ({}):\n", self.actions.len()));
    for (i, action) in self.actions.iter().enumerate() {
      output.push_str(&format!("   {}. {}\n", i + 1, action));
    }

    if self.insertions() > 0 {
      output.push_str(&format!(
        "\n⚠️  NOTE: {} insertion(s) will rewrite existing commits (ids change, contents do not)\n",
        self.insertions()
      ));
    }

    output
  }

  pub fn is_empty(&self) -> bool {
    self.actions.is_empty()
  }
}
