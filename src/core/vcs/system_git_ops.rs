//! History store primitives for SystemGit (branches, commits, history rewrite)

use super::system_git::SystemGit;
use super::{CommitInfo, CommitRecord, HistoryStore};
use crate::core::error::{ReplayError, ReplayResult, StoreError};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

const RECORD_SEP: char = '\u{1e}';
const FIELD_SEP: char = '\u{0}';

impl SystemGit {
  /// Get commit metadata for a single SHA
  pub fn get_commit(&self, sha: &str) -> ReplayResult<CommitInfo> {
    // Format: %H (hash) %an (author name) %ae (author email) %at (author time)
    //         %cn (committer name) %ce (committer email) %ct (committer time)
    //         %P (parent hashes) %B (body)
    let format = "%H%n%an%n%ae%n%at%n%cn%n%ce%n%ct%n%P%n%B";

    let mut cmd = self.git_cmd();
    cmd.args(["log", "-1", &format!("--format={}", format), sha]);
    let stdout = self.run(&format!("log -1 {}", sha), cmd)?;

    parse_commit_output(&stdout)
  }

  /// Local branches with their head commits
  fn list_branch_heads(&self) -> ReplayResult<Vec<(String, String)>> {
    let mut cmd = self.git_cmd();
    cmd.args(["for-each-ref", "--format=%(refname:short) %(objectname)", "refs/heads"]);
    let stdout = self.run("for-each-ref refs/heads", cmd)?;

    Ok(
      stdout
        .lines()
        .filter_map(|line| line.rsplit_once(' '))
        .map(|(name, sha)| (name.to_string(), sha.to_string()))
        .collect(),
    )
  }

  /// Recreate `commit` with new parents, keeping tree, identity, dates and message
  fn recreate_commit(&self, commit: &CommitInfo, parents: &[String]) -> ReplayResult<String> {
    let mut cmd = self.git_cmd();
    cmd
      .env("GIT_AUTHOR_NAME", &commit.author)
      .env("GIT_AUTHOR_EMAIL", &commit.author_email)
      .env("GIT_AUTHOR_DATE", format!("{} +0000", commit.timestamp))
      .env("GIT_COMMITTER_NAME", &commit.committer)
      .env("GIT_COMMITTER_EMAIL", &commit.committer_email)
      .env("GIT_COMMITTER_DATE", format!("{} +0000", commit.committer_timestamp));

    cmd.args(["commit-tree", &format!("{}^{{tree}}", commit.sha)]);
    for parent in parents {
      cmd.arg("-p").arg(parent);
    }
    cmd.arg("-m").arg(&commit.message);

    self.run(&format!("commit-tree {}", commit.sha), cmd)
  }
}

impl HistoryStore for SystemGit {
  fn work_tree(&self) -> &Path {
    &self.work_tree
  }

  fn is_initialized(&self) -> bool {
    self.work_tree.join(".git").exists()
  }

  fn init(&self) -> ReplayResult<()> {
    fs::create_dir_all(&self.work_tree)?;
    let mut cmd = self.git_cmd();
    cmd.args(["init", "-q", &format!("--initial-branch={}", super::BASELINE_BRANCH)]);
    self.run("init", cmd)?;
    Ok(())
  }

  fn commit_all(&self, message: &str, timestamp: DateTime<Utc>) -> ReplayResult<String> {
    let mut add = self.git_cmd();
    add.args(["add", "-A"]);
    self.run("add -A", add)?;

    let date = format!("{} +0000", timestamp.timestamp());
    let mut commit = self.git_cmd();
    commit
      .env("GIT_AUTHOR_DATE", &date)
      .env("GIT_COMMITTER_DATE", &date)
      .args(["commit", "-q", "--allow-empty", "--no-verify", "--cleanup=verbatim", "-m", message]);
    self.run(&format!("commit {}", message), commit)?;

    let mut head = self.git_cmd();
    head.args(["rev-parse", "HEAD"]);
    self.run("rev-parse HEAD", head)
  }

  fn create_branch(&self, name: &str, from: Option<&str>) -> ReplayResult<()> {
    let mut cmd = self.git_cmd();
    cmd.args(["branch", name]);
    if let Some(from) = from {
      cmd.arg(from);
    }
    self.run(&format!("branch {}", name), cmd)?;
    Ok(())
  }

  fn delete_branch(&self, name: &str) -> ReplayResult<()> {
    let mut cmd = self.git_cmd();
    cmd.args(["branch", "-D", name]);
    self.run(&format!("branch -D {}", name), cmd)?;
    Ok(())
  }

  fn branch_exists(&self, name: &str) -> ReplayResult<bool> {
    let refname = format!("refs/heads/{}", name);
    let mut cmd = self.git_cmd();
    cmd.args(["for-each-ref", "--format=%(refname)", &refname]);
    let stdout = self.run(&format!("for-each-ref {}", refname), cmd)?;
    Ok(stdout.lines().any(|line| line == refname))
  }

  fn checkout(&self, name: &str) -> ReplayResult<()> {
    let mut cmd = self.git_cmd();
    cmd.args(["checkout", "-q", "-f", name]);
    self.run(&format!("checkout {}", name), cmd)?;
    Ok(())
  }

  fn resolve_branch_head(&self, name: &str) -> ReplayResult<String> {
    if !self.branch_exists(name)? {
      return Err(ReplayError::Store(StoreError::BranchNotFound { name: name.to_string() }));
    }
    let mut cmd = self.git_cmd();
    cmd.args(["rev-parse", "--verify", &format!("refs/heads/{}^{{commit}}", name)]);
    self.run(&format!("rev-parse {}", name), cmd)
  }

  /// Move `from`, a commit on `target`, onto the head of `base`
  ///
  /// `from` and every commit descending from it, on any branch, is recreated
  /// with `commit-tree` on its original tree, so contents never conflict and
  /// never change. Commits that do not descend from `from` keep their parents,
  /// like `git rebase --onto <base> <from>^ <target>`. Branch refs only move
  /// once every commit has been written, so a failure leaves all branches
  /// where they were.
  fn rebase_onto(&self, base: &str, target: &str, from: &str) -> ReplayResult<()> {
    let new_base = self.resolve_branch_head(base)?;
    let old_head = self.resolve_branch_head(target)?;

    let mut cmd = self.git_cmd();
    cmd.args(["merge-base", "--is-ancestor", from, &old_head]);
    if !self.output(&format!("merge-base --is-ancestor {} {}", from, target), cmd)?.status.success() {
      return Err(
        StoreError::CommandFailed {
          operation: format!("rebase {} onto {}", target, base),
          stderr: format!("commit {} is not on branch {}", from, target),
        }
        .into(),
      );
    }
    let from = self.get_commit(from)?.sha;

    let mut cmd = self.git_cmd();
    cmd.args(["rev-list", "--topo-order", "--reverse", "--parents", "--branches"]);
    let all = self.run("rev-list --branches", cmd)?;

    let mut remap: HashMap<String, String> = HashMap::new();
    for line in all.lines() {
      let mut shas = line.split_whitespace();
      let Some(sha) = shas.next() else { continue };
      let parents: Vec<&str> = shas.collect();

      let new_parents: Vec<String> = if sha == from {
        vec![new_base.clone()]
      } else if parents.iter().any(|p| remap.contains_key(*p)) {
        parents
          .iter()
          .map(|p| remap.get(*p).cloned().unwrap_or_else(|| p.to_string()))
          .collect()
      } else {
        continue;
      };

      let info = self.get_commit(sha)?;
      let rewritten = self.recreate_commit(&info, &new_parents)?;
      debug!(old = %sha, new = %rewritten, "rewrote commit");
      remap.insert(sha.to_string(), rewritten);
    }

    let mut moved = HashSet::new();
    for (branch, head) in self.list_branch_heads()? {
      if let Some(new_head) = remap.get(&head) {
        let mut cmd = self.git_cmd();
        cmd.args(["update-ref", &format!("refs/heads/{}", branch), new_head, &head]);
        self.run(&format!("update-ref {}", branch), cmd)?;
        moved.insert(branch);
      }
    }

    info!(
      rewritten = remap.len(),
      branches = moved.len(),
      "rebased {} onto {}",
      target,
      base
    );
    Ok(())
  }

  fn list_commits(&self) -> ReplayResult<Vec<CommitRecord>> {
    // `log --branches` falls back to HEAD when there are no branches yet
    if !self.is_initialized() || self.list_branch_heads()?.is_empty() {
      return Ok(Vec::new());
    }

    let mut cmd = self.git_cmd();
    cmd.args(["log", "--branches", "--format=%H%x00%B%x1e"]);
    let stdout = self.run("log --branches", cmd)?;

    Ok(parse_commit_records(&stdout))
  }
}

/// Parse `%H%x00%B%x1e` records
fn parse_commit_records(stdout: &str) -> Vec<CommitRecord> {
  stdout
    .split(RECORD_SEP)
    .filter_map(|record| {
      let record = record.trim_start_matches('\n');
      let (id, message) = record.split_once(FIELD_SEP)?;
      Some(CommitRecord {
        id: id.to_string(),
        message: message.trim_end_matches('\n').to_string(),
      })
    })
    .collect()
}

/// Parse git log output into CommitInfo
///
/// Format is %H%n%an%n%ae%n%at%n%cn%n%ce%n%ct%n%P%n%B
fn parse_commit_output(output: &str) -> ReplayResult<CommitInfo> {
  let mut lines = output.lines();
  let mut field = |name: &str| {
    lines
      .next()
      .map(str::to_string)
      .ok_or_else(|| ReplayError::message(format!("Missing {} in git log output", name)))
  };

  let sha = field("commit SHA")?;
  let author = field("author name")?;
  let author_email = field("author email")?;
  let timestamp = field("author timestamp")?
    .parse::<i64>()
    .map_err(|_| ReplayError::message("Invalid author timestamp"))?;
  let committer = field("committer name")?;
  let committer_email = field("committer email")?;
  let committer_timestamp = field("committer timestamp")?
    .parse::<i64>()
    .map_err(|_| ReplayError::message("Invalid committer timestamp"))?;
  let parents_line = field("parents").unwrap_or_default();
  let parent_shas = parents_line.split_whitespace().map(|s| s.to_string()).collect();

  // Rest is commit message
  let message: Vec<String> = lines.map(|s| s.to_string()).collect();
  let message = message.join("\n").trim().to_string();

  Ok(CommitInfo {
    sha,
    author,
    author_email,
    committer,
    committer_email,
    message,
    timestamp,
    committer_timestamp,
    parent_shas,
  })
}
