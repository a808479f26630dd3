//! Test helpers for integration tests

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// A config directory with a manifest, artifacts and a target repository path
pub struct TestProject {
  _root: TempDir,
  pub path: PathBuf,
  manifest: String,
}

impl TestProject {
  /// Create a project whose releases map to branches by their major.minor prefix
  pub fn new() -> Result<Self> {
    Self::with_policy("")
  }

  /// Create a project with extra `[policy]` keys and tables appended
  pub fn with_policy(extra: &str) -> Result<Self> {
    let root = TempDir::new()?;
    let path = root.path().to_path_buf();

    fs::write(
      path.join("replay.toml"),
      format!(
        r#"[repository]
path = "history"

[policy]
ordering = ["time"]
{}

[[policy.branches]]
pattern = '^(\d+\.\d+)'
branch = "$1"
"#,
        extra
      ),
    )?;
    fs::write(path.join("releases.toml"), "")?;

    Ok(Self {
      _root: root,
      path,
      manifest: String::new(),
    })
  }

  /// Add a release with its artifact files and list it in the manifest
  pub fn add_release(&mut self, name: &str, time: &str, files: &[(&str, &str)]) -> Result<()> {
    let dir = self.path.join("artifacts").join(name);
    for (rel, content) in files {
      let file = dir.join(rel);
      fs::create_dir_all(file.parent().context("artifact file has no parent")?)?;
      fs::write(file, content)?;
    }
    self.list_release(name, time)
  }

  /// List a release in the manifest without creating its artifact
  pub fn list_release(&mut self, name: &str, time: &str) -> Result<()> {
    self.manifest.push_str(&format!(
      "[[release]]\nname = \"{}\"\ntime = \"{}\"\npath = \"artifacts/{}\"\n\n",
      name, time, name
    ));
    fs::write(self.path.join("releases.toml"), &self.manifest)?;
    Ok(())
  }

  /// Target repository
  pub fn repo(&self) -> PathBuf {
    self.path.join("history")
  }

  /// Run git in the target repository and return trimmed stdout
  pub fn git(&self, args: &[&str]) -> Result<String> {
    let output = git(&self.repo(), args)?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  /// Commit subjects along the first-parent chain of `branch`, newest first
  pub fn lineage(&self, branch: &str) -> Result<Vec<String>> {
    Ok(
      self
        .git(&["log", "--first-parent", "--format=%s", branch])?
        .lines()
        .map(String::from)
        .collect(),
    )
  }

  /// Commit id of the release with this name
  pub fn commit_of(&self, name: &str) -> Result<String> {
    let log = self.git(&["log", "--branches", "--format=%H %s"])?;
    log
      .lines()
      .filter_map(|line| line.split_once(' '))
      .find(|(_, subject)| *subject == name)
      .map(|(sha, _)| sha.to_string())
      .with_context(|| format!("no commit for {}", name))
  }

  /// Local branch names
  pub fn branches(&self) -> Result<Vec<String>> {
    Ok(
      self
        .git(&["for-each-ref", "--format=%(refname:short)", "refs/heads"])?
        .lines()
        .map(String::from)
        .collect(),
    )
  }

  /// File content at `rev`
  pub fn show(&self, rev: &str, path: &str) -> Result<String> {
    self.git(&["show", &format!("{}:{}", rev, path)])
  }
}

/// Run git command in a directory
pub fn git(cwd: &Path, args: &[&str]) -> Result<Output> {
  let output = Command::new("git")
    .current_dir(cwd)
    .args(args)
    .output()
    .context("Failed to run git command")?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    anyhow::bail!("Git command failed: git {}\n{}", args.join(" "), stderr);
  }

  Ok(output)
}

/// Run release-replay and return its output whatever the exit status
pub fn release_replay(cwd: &Path, args: &[&str]) -> Result<Output> {
  Command::new(env!("CARGO_BIN_EXE_release-replay"))
    .current_dir(cwd)
    .args(args)
    .env("RUST_LOG", "off")
    .output()
    .context("Failed to run release-replay")
}

/// Run release-replay, failing on a non-zero exit
pub fn run_release_replay(cwd: &Path, args: &[&str]) -> Result<Output> {
  let output = release_replay(cwd, args)?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    anyhow::bail!(
      "release-replay command failed: release-replay {}\nstdout: {}\nstderr: {}",
      args.join(" "),
      stdout,
      stderr
    );
  }

  Ok(output)
}

/// Parse stdout as JSON
pub fn stdout_json(output: &Output) -> Result<serde_json::Value> {
  serde_json::from_slice(&output.stdout).context("stdout is not valid JSON")
}
