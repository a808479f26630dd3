//! Release identities and the collaborators that turn them into files
//!
//! - **manifest**: `releases.toml` loading and the directory-backed [`ReleaseSource`]
//! - **workspace**: scratch workspaces, JSON normalisation and working tree sync

pub mod manifest;
pub mod workspace;

use crate::core::error::ReplayResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub use manifest::ManifestSource;
pub use workspace::{JsonNormalizer, sync_working_tree};

/// One historical artifact of the tracked product
///
/// `name` is the commit message of the release's commit and the key used to
/// find it again on later runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Release {
  pub name: String,
  pub release_time: DateTime<Utc>,
}

impl Release {
  pub fn new(name: impl Into<String>, release_time: DateTime<Utc>) -> Self {
    Self {
      name: name.into(),
      release_time,
    }
  }
}

impl fmt::Display for Release {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({})", self.name, self.release_time.format("%Y-%m-%d"))
  }
}

/// Materialises a release's files into an empty workspace directory
pub trait ReleaseSource {
  fn extract_into(&self, release: &Release, workspace: &Path) -> ReplayResult<()>;
}

/// Rewrites workspace files in place before they are committed
///
/// Implementations log and skip files they cannot handle.
pub trait Translator {
  fn translate_workspace(&self, workspace: &Path) -> ReplayResult<()>;
}
