//! Version tree built from release records + petgraph
//!
//! ## Graph Structure
//!
//! - **Directed Graph**: `A → B` means "A is the parent of B"
//! - **Nodes**: one [`ReleaseNode`] per release that survived `policy.skip`
//! - **Branches**: releases grouped by branch name, totally ordered by the policy
//! - **Root**: the first release of the earliest branch
//!
//! Every node has at most one incoming edge. Re-parenting removes that edge
//! before adding the new one, so a node's parent and its parent's children can
//! never disagree.
//!
//! ## Cross-branch parents
//!
//! The first release of each branch is attached to the latest sane release of
//! the most recent earlier sane branch that orders before it. Release times and
//! names do not always reveal the true lineage, so this is a best-effort guess;
//! `policy.parents` exists to correct it.

use crate::core::error::{ConfigError, ReplayError, ReplayResult};
use crate::policy::OrderingPolicy;
use crate::release::Release;
use petgraph::Direction;
use petgraph::algo;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// A release placed in the tree
#[derive(Debug, Clone)]
pub struct ReleaseNode {
  pub release: Release,
  pub branch: String,
}

/// One named line of releases, oldest first
#[derive(Debug, Clone)]
pub struct ReleaseBranch {
  pub name: String,
  pub nodes: Vec<NodeIndex>,
}

impl ReleaseBranch {
  pub fn first(&self) -> NodeIndex {
    self.nodes[0]
  }
}

/// Parent/child tree spanning every release
pub struct VersionTree {
  graph: DiGraph<ReleaseNode, ()>,
  branches: Vec<ReleaseBranch>,
  by_name: HashMap<String, NodeIndex>,
  root: NodeIndex,
}

impl VersionTree {
  /// Build the tree from a flat list of releases
  pub fn build(releases: &[Release], policy: &OrderingPolicy) -> ReplayResult<Self> {
    // Group by branch; the map only fixes iteration order, branch order comes later
    let mut grouped: BTreeMap<String, Vec<Release>> = BTreeMap::new();
    for release in releases {
      if policy.should_skip(release) {
        debug!(release = %release.name, "skipped by policy");
        continue;
      }
      let branch = policy.branch_name_of(release)?;
      grouped.entry(branch).or_default().push(release.clone());
    }

    if grouped.is_empty() {
      return Err(ReplayError::Config(ConfigError::Invalid {
        field: "manifest".to_string(),
        reason: "no releases left after applying policy.skip".to_string(),
      }));
    }

    let mut sorted_branches = Vec::with_capacity(grouped.len());
    for (name, members) in grouped {
      sorted_branches.push((name, policy.sort(members)?));
    }

    // Order branches by their earliest release
    let sorted_branches = policy.sort_by_release(sorted_branches, |branch| &branch.1[0])?;

    let mut graph = DiGraph::new();
    let mut by_name = HashMap::new();
    let mut branches = Vec::with_capacity(sorted_branches.len());

    for (name, members) in sorted_branches {
      let mut nodes = Vec::with_capacity(members.len());
      for release in members {
        let release_name = release.name.clone();
        let idx = graph.add_node(ReleaseNode {
          release,
          branch: name.clone(),
        });
        if let Some(&prev) = nodes.last() {
          graph.add_edge(prev, idx, ());
        }
        by_name.insert(release_name, idx);
        nodes.push(idx);
      }
      branches.push(ReleaseBranch { name, nodes });
    }

    let root = branches[0].first();
    let mut tree = Self {
      graph,
      branches,
      by_name,
      root,
    };

    tree.link_branches(policy)?;
    tree.apply_explicit_parents(policy)?;
    tree.validate()?;
    Ok(tree)
  }

  /// Attach each branch head to a release in an earlier branch
  fn link_branches(&mut self, policy: &OrderingPolicy) -> ReplayResult<()> {
    for i in 1..self.branches.len() {
      let head = self.branches[i].first();
      let mut anchor = None;

      for earlier in self.branches[..i].iter().rev() {
        if policy.is_insane_branch(&earlier.name) {
          continue;
        }
        for &candidate in earlier.nodes.iter().rev() {
          let release = &self.graph[candidate].release;
          if policy.is_insane_release(release) {
            continue;
          }
          if policy.compare(release, &self.graph[head].release)? == Ordering::Less {
            anchor = Some(candidate);
            break;
          }
        }
        if anchor.is_some() {
          break;
        }
      }

      // Nothing sane precedes this branch; hang it off the root so it stays reachable
      let parent = anchor.unwrap_or(self.root);
      debug!(
        branch = %self.branches[i].name,
        parent = %self.graph[parent].release.name,
        inferred = anchor.is_some(),
        "linked branch"
      );
      self.set_parent(head, parent);
    }
    Ok(())
  }

  fn apply_explicit_parents(&mut self, policy: &OrderingPolicy) -> ReplayResult<()> {
    let overrides: Vec<(NodeIndex, String)> = self
      .graph
      .node_indices()
      .filter_map(|idx| {
        policy
          .explicit_parent(&self.graph[idx].release)
          .map(|parent| (idx, parent.to_string()))
      })
      .collect();

    for (idx, parent_name) in overrides {
      let parent = self.by_name.get(&parent_name).copied().ok_or_else(|| {
        ReplayError::Config(ConfigError::UnknownParent {
          release: self.graph[idx].release.name.clone(),
          parent: parent_name.clone(),
        })
      })?;
      self.set_parent(idx, parent);
    }
    Ok(())
  }

  /// Check the tree invariant: acyclic, parentless root, everything reachable from it
  fn validate(&self) -> ReplayResult<()> {
    let invalid = |reason: String| ReplayError::Config(ConfigError::InvalidTree { reason });

    if algo::is_cyclic_directed(&self.graph) {
      return Err(invalid("parent overrides form a cycle".to_string()));
    }
    if let Some(parent) = self.parent(self.root) {
      return Err(invalid(format!(
        "root '{}' was given parent '{}'",
        self.graph[self.root].release.name, self.graph[parent].release.name
      )));
    }

    let mut dfs = Dfs::new(&self.graph, self.root);
    let mut reached = 0;
    while dfs.next(&self.graph).is_some() {
      reached += 1;
    }
    if reached != self.graph.node_count() {
      return Err(invalid(format!(
        "{} releases are unreachable from root",
        self.graph.node_count() - reached
      )));
    }
    Ok(())
  }

  /// Re-parent `child` under `parent`, dropping its previous parent edge
  pub fn set_parent(&mut self, child: NodeIndex, parent: NodeIndex) {
    if let Some(edge) = self.graph.edges_directed(child, Direction::Incoming).next().map(|e| e.id()) {
      self.graph.remove_edge(edge);
    }
    self.graph.add_edge(parent, child, ());
  }

  pub fn root(&self) -> NodeIndex {
    self.root
  }

  pub fn node(&self, idx: NodeIndex) -> &ReleaseNode {
    &self.graph[idx]
  }

  pub fn release(&self, idx: NodeIndex) -> &Release {
    &self.graph[idx].release
  }

  pub fn parent(&self, idx: NodeIndex) -> Option<NodeIndex> {
    self.graph.neighbors_directed(idx, Direction::Incoming).next()
  }

  /// Children in node order (branch order, then release order)
  pub fn children(&self, idx: NodeIndex) -> Vec<NodeIndex> {
    let mut children: Vec<_> = self.graph.neighbors_directed(idx, Direction::Outgoing).collect();
    children.sort();
    children
  }

  pub fn find(&self, name: &str) -> Option<NodeIndex> {
    self.by_name.get(name).copied()
  }

  pub fn branches(&self) -> &[ReleaseBranch] {
    &self.branches
  }

  pub fn len(&self) -> usize {
    self.graph.node_count()
  }

  pub fn is_empty(&self) -> bool {
    self.graph.node_count() == 0
  }

  /// Height of every subtree (a leaf is 0)
  fn subtree_depths(&self) -> Vec<usize> {
    let mut depth = vec![0usize; self.graph.node_count()];
    let mut stack = vec![(self.root, false)];

    while let Some((idx, expanded)) = stack.pop() {
      if expanded {
        depth[idx.index()] = self
          .graph
          .neighbors_directed(idx, Direction::Outgoing)
          .map(|c| depth[c.index()] + 1)
          .max()
          .unwrap_or(0);
      } else {
        stack.push((idx, true));
        stack.extend(self.graph.neighbors_directed(idx, Direction::Outgoing).map(|c| (c, false)));
      }
    }
    depth
  }

  /// Commit-replay order
  ///
  /// Pre-order walk from the root. Children with shallower subtrees are
  /// visited first, so a short side branch is finished before a long sibling
  /// line; ties fall back to node order. Parents always precede children.
  pub fn flatten(&self) -> Vec<NodeIndex> {
    let depths = self.subtree_depths();
    let mut order = Vec::with_capacity(self.graph.node_count());
    let mut stack = vec![self.root];

    while let Some(idx) = stack.pop() {
      order.push(idx);
      let mut children = self.children(idx);
      children.sort_by_key(|c| (depths[c.index()], *c));
      stack.extend(children.into_iter().rev());
    }
    order
  }
}
