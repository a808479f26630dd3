//! Workspace handling for the commit body
//!
//! A release is extracted into a scratch directory, translated in place, and
//! then mirrored into the repository's working tree. Only files that actually
//! differ are written so git sees the smallest possible change.

use super::Translator;
use crate::core::error::{ReplayResult, ResultExt};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Marker file in the repository root holding the current release name
pub const MARKER_FILE: &str = ".release";

/// Ignore file written into the baseline commit
pub const IGNORE_FILE: &str = ".gitignore";

/// Contents of [`IGNORE_FILE`] in the baseline commit
pub const IGNORE_RULES: &str = ".DS_Store\nThumbs.db\n*.tmp\n";

/// Entries the sync never deletes or overwrites
const PRESERVED: &[&str] = &[".git", IGNORE_FILE, MARKER_FILE];

/// Scratch directory for one release, removed on drop
pub struct Workspace {
  dir: tempfile::TempDir,
}

impl Workspace {
  pub fn new() -> ReplayResult<Self> {
    let dir = tempfile::Builder::new()
      .prefix("release-replay-")
      .tempdir()
      .context("Failed to create scratch workspace")?;
    Ok(Self { dir })
  }

  pub fn path(&self) -> &Path {
    self.dir.path()
  }
}

/// Rewrites every `*.json` file with sorted keys and stable formatting
///
/// serde_json's default map is ordered, so a parse/serialize round trip sorts
/// keys at every level.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonNormalizer;

impl JsonNormalizer {
  fn normalize_file(path: &Path) -> ReplayResult<bool> {
    let raw = fs::read(path)?;
    let value: serde_json::Value = serde_json::from_slice(&raw)?;
    let mut normalized = serde_json::to_vec_pretty(&value)?;
    normalized.push(b'\n');
    if normalized == raw {
      return Ok(false);
    }
    fs::write(path, normalized)?;
    Ok(true)
  }
}

impl Translator for JsonNormalizer {
  fn translate_workspace(&self, workspace: &Path) -> ReplayResult<()> {
    let files: Vec<PathBuf> = list_files(workspace)?
      .into_iter()
      .filter(|rel| rel.extension().is_some_and(|ext| ext == "json"))
      .map(|rel| workspace.join(rel))
      .collect();

    let rewritten: usize = files
      .par_iter()
      .map(|path| match Self::normalize_file(path) {
        Ok(changed) => usize::from(changed),
        Err(e) => {
          warn!(file = %path.display(), error = %e, "skipping JSON normalization");
          0
        }
      })
      .sum();

    debug!(files = files.len(), rewritten, "normalized JSON files");
    Ok(())
  }
}

/// Mirror `workspace` into the working tree at `repo`
///
/// Deletes repository files that are absent from the workspace, copies new or
/// changed files, and leaves identical files untouched. `.git`, the ignore file
/// and the marker are never touched; a release shipping its own copy of one of
/// them has that copy ignored.
pub fn sync_working_tree(repo: &Path, workspace: &Path) -> ReplayResult<SyncStats> {
  for name in PRESERVED {
    if workspace.join(name).exists() {
      warn!(entry = name, "ignoring release entry managed by the repository");
    }
  }

  let wanted: BTreeSet<PathBuf> = list_files(workspace)?.into_iter().collect();
  let existing: BTreeSet<PathBuf> = list_files(repo)?.into_iter().collect();
  let mut stats = SyncStats::default();

  for rel in existing.difference(&wanted) {
    fs::remove_file(repo.join(rel)).with_context(|| format!("Failed to remove {}", rel.display()))?;
    stats.removed += 1;
  }
  // A directory emptied above may be where the release now has a file
  remove_empty_dirs(repo, true)?;

  for rel in &wanted {
    let source = workspace.join(rel);
    let target = repo.join(rel);

    if existing.contains(rel) && fs::read(&source)? == fs::read(&target)? {
      stats.unchanged += 1;
      continue;
    }

    if let Some(parent) = target.parent() {
      fs::create_dir_all(parent)?;
    }
    fs::copy(&source, &target).with_context(|| format!("Failed to copy {}", rel.display()))?;
    stats.written += 1;
  }

  Ok(stats)
}

/// Counters reported by [`sync_working_tree`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncStats {
  pub written: usize,
  pub removed: usize,
  pub unchanged: usize,
}

/// Write the marker file recording which release the tree holds
pub fn write_marker(repo: &Path, release_name: &str) -> ReplayResult<()> {
  fs::write(repo.join(MARKER_FILE), format!("{}\n", release_name))?;
  Ok(())
}

/// Relative paths of all regular files under `root`, skipping preserved entries at the top level
fn list_files(root: &Path) -> ReplayResult<Vec<PathBuf>> {
  let mut files = Vec::new();
  let mut stack = vec![PathBuf::new()];

  while let Some(rel_dir) = stack.pop() {
    for entry in fs::read_dir(root.join(&rel_dir))? {
      let entry = entry?;
      let name = entry.file_name();
      if rel_dir.as_os_str().is_empty() && PRESERVED.iter().any(|p| name == *p) {
        continue;
      }
      let rel = rel_dir.join(&name);
      if entry.file_type()?.is_dir() {
        stack.push(rel);
      } else {
        files.push(rel);
      }
    }
  }

  files.sort();
  Ok(files)
}

/// Remove directories left empty after a sync; returns true when `dir` is empty
fn remove_empty_dirs(dir: &Path, is_root: bool) -> ReplayResult<bool> {
  let mut empty = true;
  for entry in fs::read_dir(dir)? {
    let entry = entry?;
    let name = entry.file_name();
    if is_root && PRESERVED.iter().any(|p| name == *p) {
      empty = false;
      continue;
    }
    if entry.file_type()?.is_dir() {
      if remove_empty_dirs(&entry.path(), false)? {
        fs::remove_dir(entry.path())?;
      } else {
        empty = false;
      }
    } else {
      empty = false;
    }
  }
  Ok(empty)
}
