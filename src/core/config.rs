use crate::core::error::{ConfigError, ReplayError, ReplayResult, ResultExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for release-replay
/// Searched in order: replay.toml, .replay.toml, .config/replay.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
  pub repository: RepositoryConfig,
  #[serde(default)]
  pub store: StoreConfig,
  #[serde(default)]
  pub policy: PolicyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
  /// Target repository (relative paths resolve against the config directory)
  pub path: PathBuf,

  /// Release manifest (default: releases.toml)
  #[serde(default = "default_manifest")]
  pub manifest: PathBuf,
}

fn default_manifest() -> PathBuf {
  PathBuf::from("releases.toml")
}

/// History store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
  /// Version control binary (default: git)
  #[serde(default = "default_program")]
  pub program: String,

  /// Per-command timeout in seconds. 0 waits forever.
  #[serde(default)]
  pub timeout_secs: u64,

  /// Author and committer name for replayed commits
  #[serde(default = "default_author_name")]
  pub author_name: String,

  /// Author and committer email for replayed commits
  #[serde(default = "default_author_email")]
  pub author_email: String,
}

fn default_program() -> String {
  "git".to_string()
}

fn default_author_name() -> String {
  "Release Replay".to_string()
}

fn default_author_email() -> String {
  "replay@localhost".to_string()
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      program: default_program(),
      timeout_secs: 0,
      author_name: default_author_name(),
      author_email: default_author_email(),
    }
  }
}

/// One ordering strategy, evaluated in the order listed in `policy.ordering`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderingStrategy {
  /// Position in `policy.order`
  Listed,
  /// Release timestamp
  Time,
  /// Structural comparison of the release names
  BestGuess,
}

/// Release ordering and branch placement rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
  /// Strategies tried in order until one tells two releases apart
  #[serde(default = "default_ordering")]
  pub ordering: Vec<OrderingStrategy>,

  /// Explicit release order used by the `listed` strategy
  #[serde(default)]
  pub order: Vec<String>,

  /// Regexes; matching releases are dropped before the tree is built
  #[serde(default)]
  pub skip: Vec<String>,

  /// Branch rules, first match wins
  #[serde(default)]
  pub branches: Vec<BranchRule>,

  /// Snapshot (year, week) windows, consulted when no branch rule matches
  #[serde(default)]
  pub snapshot_windows: Vec<SnapshotWindow>,

  /// Branches never used as cross-branch parents
  #[serde(default)]
  pub insane_branches: Vec<String>,

  /// Releases never used as cross-branch parents
  #[serde(default)]
  pub insane_releases: Vec<String>,

  /// Explicit parent overrides: release name -> parent release name
  #[serde(default)]
  pub parents: BTreeMap<String, String>,
}

fn default_ordering() -> Vec<OrderingStrategy> {
  vec![
    OrderingStrategy::Listed,
    OrderingStrategy::Time,
    OrderingStrategy::BestGuess,
  ]
}

impl Default for PolicyConfig {
  fn default() -> Self {
    Self {
      ordering: default_ordering(),
      order: Vec::new(),
      skip: Vec::new(),
      branches: Vec::new(),
      snapshot_windows: Vec::new(),
      insane_branches: Vec::new(),
      insane_releases: Vec::new(),
      parents: BTreeMap::new(),
    }
  }
}

/// Maps release names matching `pattern` to `branch`
///
/// `branch` may reference capture groups (`$1`, `${name}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchRule {
  pub pattern: String,
  pub branch: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct YearWeek {
  pub year: u32,
  pub week: u32,
}

/// Snapshots published between `from` and `to` (inclusive) belong to `branch`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotWindow {
  pub branch: String,
  pub from: YearWeek,
  pub to: YearWeek,
}

impl PolicyConfig {
  /// Validate policy configuration
  pub fn validate(&self) -> ReplayResult<()> {
    if self.ordering.is_empty() {
      return Err(invalid("policy.ordering", "at least one strategy is required"));
    }

    for (i, strategy) in self.ordering.iter().enumerate() {
      if self.ordering[..i].contains(strategy) {
        return Err(invalid("policy.ordering", format!("{:?} is listed twice", strategy)));
      }
    }

    for pattern in self.skip.iter().chain(self.branches.iter().map(|r| &r.pattern)) {
      if let Err(e) = regex::Regex::new(pattern) {
        return Err(invalid("policy", format!("bad pattern '{}': {}", pattern, e)));
      }
    }

    for window in &self.snapshot_windows {
      if window.from > window.to {
        return Err(invalid(
          "policy.snapshot_windows",
          format!("window for '{}' ends before it starts", window.branch),
        ));
      }
      if !(1..=53).contains(&window.from.week) || !(1..=53).contains(&window.to.week) {
        return Err(invalid(
          "policy.snapshot_windows",
          format!("week out of range in window for '{}'", window.branch),
        ));
      }
    }

    for (release, parent) in &self.parents {
      if release == parent {
        return Err(invalid("policy.parents", format!("'{}' cannot be its own parent", release)));
      }
    }

    Ok(())
  }
}

impl StoreConfig {
  pub fn validate(&self) -> ReplayResult<()> {
    if self.program.trim().is_empty() {
      return Err(invalid("store.program", "must not be empty"));
    }
    if self.author_email.trim().is_empty() {
      return Err(invalid("store.author_email", "must not be empty"));
    }
    Ok(())
  }
}

fn invalid(field: &str, reason: impl Into<String>) -> ReplayError {
  ReplayError::Config(ConfigError::Invalid {
    field: field.to_string(),
    reason: reason.into(),
  })
}

impl ReplayConfig {
  /// Find config file in search order: replay.toml, .replay.toml, .config/replay.toml
  pub fn find_config_path(path: &Path) -> Option<PathBuf> {
    let candidates = vec![
      path.join("replay.toml"),
      path.join(".replay.toml"),
      path.join(".config").join("replay.toml"),
    ];

    candidates.into_iter().find(|p| p.exists())
  }

  /// Load config from replay.toml (searches multiple locations)
  pub fn load(path: &Path) -> ReplayResult<Self> {
    let config_path = Self::find_config_path(path).ok_or_else(|| {
      ReplayError::Config(ConfigError::NotFound {
        dir: path.to_path_buf(),
      })
    })?;

    let content = fs::read_to_string(&config_path)
      .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
    Self::parse(&content).with_context(|| format!("Invalid configuration in {}", config_path.display()))
  }

  /// Parse and validate a configuration document
  pub fn parse(content: &str) -> ReplayResult<Self> {
    let config: ReplayConfig = toml_edit::de::from_str(content)?;
    config.policy.validate()?;
    config.store.validate()?;
    Ok(config)
  }

  /// Save config to replay.toml (default location)
  pub fn save(&self, path: &Path) -> ReplayResult<()> {
    let config_path = path.join("replay.toml");
    let content = toml_edit::ser::to_string_pretty(self).context("Failed to serialize config to TOML")?;
    fs::write(&config_path, content).with_context(|| format!("Failed to write config to {}", config_path.display()))?;
    Ok(())
  }

  /// Check if config exists at the given path
  pub fn exists(path: &Path) -> bool {
    Self::find_config_path(path).is_some()
  }

  /// Create a starter config
  pub fn new(repository: PathBuf) -> Self {
    Self {
      repository: RepositoryConfig {
        path: repository,
        manifest: default_manifest(),
      },
      store: StoreConfig::default(),
      policy: PolicyConfig::default(),
    }
  }

  /// Target repository path, resolved against the config directory
  pub fn repository_path(&self, config_dir: &Path) -> PathBuf {
    config_dir.join(&self.repository.path)
  }

  /// Manifest path, resolved against the config directory
  pub fn manifest_path(&self, config_dir: &Path) -> PathBuf {
    config_dir.join(&self.repository.manifest)
  }
}
