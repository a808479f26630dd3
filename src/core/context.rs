//! Replay context - load once, pass everywhere
//!
//! ```text
//! main.rs:
//!   ReplayContext::build(config_dir) -> &ReplayContext
//!   |
//!   v
//! commands/tree.rs, status.rs, run.rs:
//!   fn run_*(ctx: &ReplayContext, ...)
//! ```
//!
//! Building the context validates everything that can be validated without
//! touching the repository: configuration, manifest, branch rules and
//! ordering. Configuration errors therefore surface before any mutation.

use crate::core::config::ReplayConfig;
use crate::core::correlation::Correlation;
use crate::core::error::{ConfigError, ReplayError, ReplayResult, ResultExt};
use crate::core::vcs::{HistoryStore, SystemGit};
use crate::graph::VersionTree;
use crate::policy::OrderingPolicy;
use crate::release::ManifestSource;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Everything a command needs, built from one configuration directory
pub struct ReplayContext {
  /// Directory holding replay.toml (absolute path)
  pub config_dir: PathBuf,

  pub config: ReplayConfig,

  /// Releases listed in the manifest
  pub source: ManifestSource,

  pub policy: OrderingPolicy,

  /// Version tree over every non-skipped release
  pub tree: VersionTree,

  /// Target repository
  pub store: SystemGit,
}

impl ReplayContext {
  /// Load configuration and manifest, then build the version tree
  pub fn build(config_dir: &Path) -> ReplayResult<Self> {
    let config_dir = config_dir
      .canonicalize()
      .with_context(|| format!("Config directory {} is not accessible", config_dir.display()))?;

    if !ReplayConfig::exists(&config_dir) {
      return Err(ReplayError::Config(ConfigError::NotFound { dir: config_dir }));
    }
    let config = ReplayConfig::load(&config_dir)?;

    let manifest_path = config.manifest_path(&config_dir);
    let source = ManifestSource::load(&manifest_path)?;
    debug!(manifest = %manifest_path.display(), releases = source.releases().len(), "loaded manifest");

    let policy = OrderingPolicy::from_config(&config.policy)?;
    let tree = VersionTree::build(source.releases(), &policy)?;
    debug!(releases = tree.len(), branches = tree.branches().len(), "built version tree");

    let store = SystemGit::new(&config.repository_path(&config_dir), &config.store);

    Ok(Self {
      config_dir,
      config,
      source,
      policy,
      tree,
      store,
    })
  }

  /// Scan the repository for commits that already hold releases
  pub fn scan(&self) -> ReplayResult<Correlation> {
    Ok(Correlation::rebuild(&self.store.list_commits()?))
  }

  /// Target repository path (convenience)
  pub fn repository_path(&self) -> &Path {
    self.store.work_tree()
  }
}
