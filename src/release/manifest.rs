//! `releases.toml` manifest
//!
//! ```toml
//! [[release]]
//! name = "1.0"
//! time = "2011-11-18T00:00:00Z"
//! path = "artifacts/1.0"
//! ```
//!
//! `path` is a directory (copied recursively) or a single file, relative to the
//! manifest's directory.

use super::{Release, ReleaseSource};
use crate::core::error::{ConfigError, ExtractionError, ReplayError, ReplayResult, ResultExt};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct ManifestFile {
  #[serde(default)]
  release: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
  name: String,
  time: DateTime<Utc>,
  path: PathBuf,
}

/// Release source backed by directories on disk
pub struct ManifestSource {
  base_dir: PathBuf,
  releases: Vec<Release>,
  paths: HashMap<String, PathBuf>,
}

impl ManifestSource {
  /// Load the manifest at `path`
  pub fn load(path: &Path) -> ReplayResult<Self> {
    let content =
      fs::read_to_string(path).with_context(|| format!("Failed to read release manifest {}", path.display()))?;
    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Self::parse(&content, base_dir).with_context(|| format!("Invalid release manifest {}", path.display()))
  }

  /// Parse a manifest document; artifact paths resolve against `base_dir`
  pub fn parse(content: &str, base_dir: PathBuf) -> ReplayResult<Self> {
    let manifest: ManifestFile = toml_edit::de::from_str(content)?;

    let mut releases = Vec::with_capacity(manifest.release.len());
    let mut paths = HashMap::with_capacity(manifest.release.len());

    for entry in manifest.release {
      if entry.name.trim().is_empty() {
        return Err(ReplayError::Config(ConfigError::Invalid {
          field: "release.name".to_string(),
          reason: "must not be empty".to_string(),
        }));
      }
      if paths.contains_key(&entry.name) {
        return Err(ReplayError::Config(ConfigError::DuplicateRelease { name: entry.name }));
      }
      releases.push(Release::new(entry.name.clone(), entry.time));
      paths.insert(entry.name, entry.path);
    }

    Ok(Self {
      base_dir,
      releases,
      paths,
    })
  }

  /// All releases, in manifest order
  pub fn releases(&self) -> &[Release] {
    &self.releases
  }

  fn artifact_path(&self, release: &Release) -> Option<PathBuf> {
    self.paths.get(&release.name).map(|p| self.base_dir.join(p))
  }
}

impl ReleaseSource for ManifestSource {
  fn extract_into(&self, release: &Release, workspace: &Path) -> ReplayResult<()> {
    let source = self.artifact_path(release).ok_or_else(|| ExtractionError::Failed {
      release: release.name.clone(),
      reason: "release is not in the manifest".to_string(),
    })?;

    if !source.exists() {
      return Err(
        ExtractionError::Missing {
          release: release.name.clone(),
          path: source,
        }
        .into(),
      );
    }

    let copied = if source.is_dir() {
      copy_tree(&source, workspace)
    } else {
      let file_name = source.file_name().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("artifact"));
      fs::copy(&source, workspace.join(file_name)).map(|_| ())
    };

    copied.map_err(|e| {
      ExtractionError::Failed {
        release: release.name.clone(),
        reason: e.to_string(),
      }
      .into()
    })
  }
}

fn copy_tree(from: &Path, to: &Path) -> std::io::Result<()> {
  fs::create_dir_all(to)?;
  for entry in fs::read_dir(from)? {
    let entry = entry?;
    let target = to.join(entry.file_name());
    if entry.file_type()?.is_dir() {
      copy_tree(&entry.path(), &target)?;
    } else {
      fs::copy(entry.path(), &target)?;
    }
  }
  Ok(())
}
