//! Release ordering and branch placement policy
//!
//! The policy answers every per-release question the version tree needs:
//! skip or keep, which branch, whether it may anchor another branch, whether
//! it has a forced parent, and how it orders against another release.
//!
//! Ordering is an ordered list of strategies. Each strategy either decides a
//! pair or passes; the first decision wins. A pair no strategy decides is a
//! configuration error, never a silent tie-break.

pub mod best_guess;

use crate::core::config::{OrderingStrategy, PolicyConfig, SnapshotWindow, YearWeek};
use crate::core::error::{ConfigError, ReplayError, ReplayResult};
use crate::release::Release;
use best_guess::Snapshot;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

type Strategy = Box<dyn Fn(&Release, &Release) -> Option<Ordering> + Send + Sync>;

struct CompiledRule {
  pattern: Regex,
  branch: String,
}

/// Compiled form of [`PolicyConfig`]
pub struct OrderingPolicy {
  skip: Vec<Regex>,
  rules: Vec<CompiledRule>,
  windows: Vec<SnapshotWindow>,
  insane_branches: HashSet<String>,
  insane_releases: HashSet<String>,
  parents: HashMap<String, String>,
  strategies: Vec<Strategy>,
}

impl OrderingPolicy {
  /// Compile a policy from configuration
  pub fn from_config(config: &PolicyConfig) -> ReplayResult<Self> {
    let skip = config.skip.iter().map(|p| compile(p)).collect::<ReplayResult<Vec<_>>>()?;
    let rules = config
      .branches
      .iter()
      .map(|r| {
        Ok(CompiledRule {
          pattern: compile(&r.pattern)?,
          branch: r.branch.clone(),
        })
      })
      .collect::<ReplayResult<Vec<_>>>()?;

    let strategies = config
      .ordering
      .iter()
      .map(|strategy| build_strategy(*strategy, &config.order))
      .collect();

    Ok(Self {
      skip,
      rules,
      windows: config.snapshot_windows.clone(),
      insane_branches: config.insane_branches.iter().cloned().collect(),
      insane_releases: config.insane_releases.iter().cloned().collect(),
      parents: config.parents.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
      strategies,
    })
  }

  /// True when the release is excluded before the tree is built
  pub fn should_skip(&self, release: &Release) -> bool {
    self.skip.iter().any(|re| re.is_match(&release.name))
  }

  /// Resolve the release branch a release belongs to
  ///
  /// Pattern rules are tried in order, then snapshot windows. A release no
  /// rule places is fatal.
  pub fn branch_name_of(&self, release: &Release) -> ReplayResult<String> {
    for rule in &self.rules {
      if let Some(caps) = rule.pattern.captures(&release.name) {
        let mut branch = String::new();
        caps.expand(&rule.branch, &mut branch);
        return Ok(branch);
      }
    }

    if let Some(snapshot) = Snapshot::parse(&release.name) {
      let at = YearWeek {
        year: snapshot.year,
        week: snapshot.week,
      };
      if let Some(window) = self.windows.iter().find(|w| w.from <= at && at <= w.to) {
        return Ok(window.branch.clone());
      }
    }

    Err(ReplayError::Config(ConfigError::UnresolvedBranch {
      release: release.name.clone(),
    }))
  }

  pub fn is_insane_branch(&self, branch: &str) -> bool {
    self.insane_branches.contains(branch)
  }

  pub fn is_insane_release(&self, release: &Release) -> bool {
    self.insane_releases.contains(&release.name)
  }

  /// Forced parent for a release, overriding every inferred edge
  pub fn explicit_parent(&self, release: &Release) -> Option<&str> {
    self.parents.get(&release.name).map(String::as_str)
  }

  /// Total order over releases
  ///
  /// Identical names compare equal; any other undecided pair is an
  /// [`ConfigError::AmbiguousOrder`].
  pub fn compare(&self, a: &Release, b: &Release) -> ReplayResult<Ordering> {
    if a.name == b.name {
      return Ok(Ordering::Equal);
    }

    self
      .strategies
      .iter()
      .find_map(|strategy| strategy(a, b).filter(|ord| *ord != Ordering::Equal))
      .ok_or_else(|| {
        ReplayError::Config(ConfigError::AmbiguousOrder {
          left: a.name.clone(),
          right: b.name.clone(),
        })
      })
  }

  /// Sort releases with [`Self::compare`]
  pub fn sort(&self, releases: Vec<Release>) -> ReplayResult<Vec<Release>> {
    self.sort_by_release(releases, |release| release)
  }

  /// Sort items by the release `key` picks out of each
  ///
  /// Every pair is compared, so a strategy list that orders some releases in
  /// a cycle is reported as [`ConfigError::InconsistentOrder`] instead of
  /// producing an arbitrary order.
  pub fn sort_by_release<T>(&self, items: Vec<T>, key: impl Fn(&T) -> &Release) -> ReplayResult<Vec<T>> {
    let n = items.len();
    let mut ranks = vec![0usize; n];
    for i in 0..n {
      for j in (i + 1)..n {
        if self.compare(key(&items[i]), key(&items[j]))? == Ordering::Less {
          ranks[j] += 1;
        } else {
          ranks[i] += 1;
        }
      }
    }

    let mut ranked: Vec<(usize, T)> = ranks.into_iter().zip(items).collect();
    ranked.sort_by_key(|(rank, _)| *rank);
    let sorted: Vec<T> = ranked.into_iter().map(|(_, item)| item).collect();

    // Ranks are exactly 0..n when the pairwise order is transitive
    for i in 0..n {
      for j in (i + 1)..n {
        let (earlier, later) = (key(&sorted[i]), key(&sorted[j]));
        if self.compare(earlier, later)? != Ordering::Less {
          return Err(ReplayError::Config(ConfigError::InconsistentOrder {
            earlier: earlier.name.clone(),
            later: later.name.clone(),
          }));
        }
      }
    }
    Ok(sorted)
  }
}

fn compile(pattern: &str) -> ReplayResult<Regex> {
  Regex::new(pattern).map_err(|e| {
    ReplayError::Config(ConfigError::Invalid {
      field: "policy".to_string(),
      reason: format!("bad pattern '{}': {}", pattern, e),
    })
  })
}

fn build_strategy(strategy: OrderingStrategy, order: &[String]) -> Strategy {
  match strategy {
    OrderingStrategy::Listed => {
      let index: HashMap<String, usize> = order.iter().enumerate().map(|(i, name)| (name.clone(), i)).collect();
      Box::new(move |a, b| match (index.get(&a.name), index.get(&b.name)) {
        (Some(x), Some(y)) => Some(x.cmp(y)),
        _ => None,
      })
    }
    OrderingStrategy::Time => Box::new(|a, b| Some(a.release_time.cmp(&b.release_time))),
    OrderingStrategy::BestGuess => Box::new(|a, b| Some(best_guess::compare_names(&a.name, &b.name))),
  }
}
