use crate::core::context::ReplayContext;
use crate::core::error::ReplayResult;
use crate::core::vcs::BASELINE_MESSAGE;
use chrono::{DateTime, Utc};
use petgraph::graph::NodeIndex;
use serde::Serialize;

/// One release in replay order
#[derive(Debug, Clone, Serialize)]
pub struct TreeEntry {
  pub name: String,
  pub branch: String,
  pub time: DateTime<Utc>,
  /// Parent release; the root hangs off the baseline commit
  pub parent: Option<String>,
  /// Excluded from cross-branch parent inference
  pub insane: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BranchEntry {
  pub name: String,
  pub releases: Vec<String>,
  /// Parent of the branch's first release
  pub parent: Option<String>,
  pub insane: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TreeReport {
  pub root: String,
  pub branches: Vec<BranchEntry>,
  pub order: Vec<TreeEntry>,
}

impl TreeReport {
  pub fn from_context(ctx: &ReplayContext) -> Self {
    let tree = &ctx.tree;
    let parent_name = |idx: NodeIndex| tree.parent(idx).map(|p| tree.release(p).name.clone());

    let branches = tree
      .branches()
      .iter()
      .map(|branch| BranchEntry {
        name: branch.name.clone(),
        releases: branch.nodes.iter().map(|idx| tree.release(*idx).name.clone()).collect(),
        parent: parent_name(branch.first()),
        insane: ctx.policy.is_insane_branch(&branch.name),
      })
      .collect();

    let order = tree
      .flatten()
      .into_iter()
      .map(|idx| {
        let node = tree.node(idx);
        TreeEntry {
          name: node.release.name.clone(),
          branch: node.branch.clone(),
          time: node.release.release_time,
          parent: parent_name(idx),
          insane: ctx.policy.is_insane_release(&node.release),
        }
      })
      .collect();

    Self {
      root: tree.release(tree.root()).name.clone(),
      branches,
      order,
    }
  }
}

/// Run the tree command
pub fn run_tree(ctx: &ReplayContext, json: bool) -> ReplayResult<()> {
  let report = TreeReport::from_context(ctx);

  if json {
    println!("{}", serde_json::to_string_pretty(&report)?);
    return Ok(());
  }

  println!(
    "🌳 Version tree: {} releases in {} branches (root: {})",
    report.order.len(),
    report.branches.len(),
    report.root
  );

  println!("\n📦 Branches:");
  for branch in &report.branches {
    let parent = branch.parent.as_deref().unwrap_or(BASELINE_MESSAGE);
    let flag = if branch.insane { " [insane]" } else { "" };
    println!(
      "   {}{} ({} releases, from {})",
      branch.name,
      flag,
      branch.releases.len(),
      parent
    );
  }

  println!("\n📋 Replay order:");
  for (i, entry) in report.order.iter().enumerate() {
    let parent = entry.parent.as_deref().unwrap_or(BASELINE_MESSAGE);
    let flag = if entry.insane { " [insane]" } else { "" };
    println!(
      "   {}. {} [{}] <- {}{}",
      i + 1,
      entry.name,
      entry.branch,
      parent,
      flag
    );
  }

  Ok(())
}
