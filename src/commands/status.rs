use crate::core::context::ReplayContext;
use crate::core::error::ReplayResult;
use crate::core::vcs::{BASELINE_MESSAGE, HistoryStore};
use serde::Serialize;
use std::collections::HashSet;

/// Status of a single release
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseStatus {
  pub name: String,
  pub branch: String,
  /// Commit holding the release, if any
  pub commit: Option<String>,
}

/// Repository status against the manifest
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
  pub repository: String,
  pub initialized: bool,
  pub committed: usize,
  pub pending: usize,
  pub releases: Vec<ReleaseStatus>,
  /// Commit messages that match no release in the manifest
  pub unknown: Vec<String>,
}

/// Run the status command
pub fn run_status(ctx: &ReplayContext, json: bool) -> ReplayResult<()> {
  let correlation = ctx.scan()?;
  let tree = &ctx.tree;

  let releases: Vec<ReleaseStatus> = tree
    .flatten()
    .into_iter()
    .map(|idx| {
      let node = tree.node(idx);
      ReleaseStatus {
        name: node.release.name.clone(),
        branch: node.branch.clone(),
        commit: correlation.id_of(&node.release.name).map(str::to_string),
      }
    })
    .collect();

  let known: HashSet<&str> = releases.iter().map(|r| r.name.as_str()).collect();
  let mut seen = HashSet::new();
  let unknown: Vec<String> = ctx
    .store
    .list_commits()?
    .into_iter()
    .map(|c| c.message)
    .filter(|m| m != BASELINE_MESSAGE && !known.contains(m.as_str()))
    .filter(|m| seen.insert(m.clone()))
    .collect();

  let committed = releases.iter().filter(|r| r.commit.is_some()).count();
  let report = StatusReport {
    repository: ctx.repository_path().display().to_string(),
    initialized: ctx.store.is_initialized(),
    committed,
    pending: releases.len() - committed,
    releases,
    unknown,
  };

  if json {
    println!("{}", serde_json::to_string_pretty(&report)?);
  } else {
    print_status(&report);
  }

  Ok(())
}

fn print_status(report: &StatusReport) {
  println!("📊 Repository: {}", report.repository);

  if !report.initialized {
    println!("   Not initialized ({} releases pending)", report.pending);
    println!("\n💡 Run 'release-replay run --apply' to create it");
    return;
  }

  println!("   {} committed, {} pending", report.committed, report.pending);

  let pending: Vec<_> = report.releases.iter().filter(|r| r.commit.is_none()).collect();
  if !pending.is_empty() {
    println!("\n⏳ Pending:");
    for release in pending {
      println!("   {} [{}]", release.name, release.branch);
    }
  }

  if !report.unknown.is_empty() {
    println!("\n⚠️  Commits not in the manifest:");
    for message in &report.unknown {
      println!("   {}", message);
    }
  }

  if report.pending == 0 {
    println!("\n✅ Up to date");
  }
}
