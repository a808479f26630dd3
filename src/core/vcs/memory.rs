//! In-memory history store for unit tests
//!
//! Commits snapshot the files of a real scratch working tree, so the commit
//! body runs unchanged against it. Every mutating call is counted.

use super::{CommitRecord, HistoryStore};
use crate::core::error::{ReplayResult, StoreError};
use chrono::{DateTime, Utc};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[derive(Debug, Clone)]
pub struct MemoryCommit {
  pub id: String,
  pub message: String,
  pub parent: Option<String>,
  pub timestamp: DateTime<Utc>,
  pub files: BTreeMap<PathBuf, Vec<u8>>,
}

#[derive(Default)]
struct State {
  initialized: bool,
  commits: Vec<MemoryCommit>,
  branches: BTreeMap<String, String>,
  head: Option<String>,
  mutations: usize,
}

pub struct MemoryStore {
  dir: TempDir,
  state: RefCell<State>,
  fail_rebase: Cell<bool>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self {
      dir: TempDir::new().unwrap(),
      state: RefCell::new(State::default()),
      fail_rebase: Cell::new(false),
    }
  }

  /// Make every later `rebase_onto` fail without touching any branch
  pub fn fail_rebases(&self) {
    self.fail_rebase.set(true);
  }

  pub fn mutations(&self) -> usize {
    self.state.borrow().mutations
  }

  pub fn commit(&self, id: &str) -> MemoryCommit {
    let state = self.state.borrow();
    state.commits.iter().find(|c| c.id == id).cloned().unwrap()
  }

  pub fn branch_names(&self) -> Vec<String> {
    self.state.borrow().branches.keys().cloned().collect()
  }

  /// Messages from the branch head down to the root commit
  pub fn lineage(&self, branch: &str) -> Vec<String> {
    let mut cursor = self.state.borrow().branches.get(branch).cloned();
    let mut messages = Vec::new();
    while let Some(id) = cursor {
      let commit = self.commit(&id);
      messages.push(commit.message);
      cursor = commit.parent;
    }
    messages
  }

  /// Id of the reachable commit carrying `message`
  pub fn id_of(&self, message: &str) -> Option<String> {
    self
      .list_commits()
      .unwrap()
      .into_iter()
      .find(|r| r.message == message)
      .map(|r| r.id)
  }

  fn fail(operation: &str, reason: &str) -> StoreError {
    StoreError::CommandFailed {
      operation: operation.to_string(),
      stderr: reason.to_string(),
    }
  }

  fn snapshot(&self) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut files = BTreeMap::new();
    let mut stack = vec![PathBuf::new()];
    while let Some(rel_dir) = stack.pop() {
      for entry in fs::read_dir(self.dir.path().join(&rel_dir)).unwrap() {
        let entry = entry.unwrap();
        let rel = rel_dir.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
          stack.push(rel);
        } else {
          files.insert(rel, fs::read(entry.path()).unwrap());
        }
      }
    }
    files
  }

  fn restore(&self, files: &BTreeMap<PathBuf, Vec<u8>>) {
    for entry in fs::read_dir(self.dir.path()).unwrap() {
      let path = entry.unwrap().path();
      if path.is_dir() {
        fs::remove_dir_all(path).unwrap();
      } else {
        fs::remove_file(path).unwrap();
      }
    }
    for (rel, content) in files {
      let path = self.dir.path().join(rel);
      fs::create_dir_all(path.parent().unwrap()).unwrap();
      fs::write(path, content).unwrap();
    }
  }

  fn reachable(state: &State) -> HashSet<String> {
    let mut seen = HashSet::new();
    for head in state.branches.values() {
      let mut cursor = Some(head.clone());
      while let Some(id) = cursor {
        if !seen.insert(id.clone()) {
          break;
        }
        cursor = state.commits.iter().find(|c| c.id == id).and_then(|c| c.parent.clone());
      }
    }
    seen
  }

  fn ancestors(state: &State, id: &str) -> HashSet<String> {
    let mut seen = HashSet::new();
    let mut cursor = Some(id.to_string());
    while let Some(id) = cursor {
      cursor = state.commits.iter().find(|c| c.id == id).and_then(|c| c.parent.clone());
      seen.insert(id);
    }
    seen
  }
}

impl HistoryStore for MemoryStore {
  fn work_tree(&self) -> &Path {
    self.dir.path()
  }

  fn is_initialized(&self) -> bool {
    self.state.borrow().initialized
  }

  fn init(&self) -> ReplayResult<()> {
    let mut state = self.state.borrow_mut();
    state.mutations += 1;
    state.initialized = true;
    state.head = Some(super::BASELINE_BRANCH.to_string());
    Ok(())
  }

  fn commit_all(&self, message: &str, timestamp: DateTime<Utc>) -> ReplayResult<String> {
    let files = self.snapshot();
    let mut state = self.state.borrow_mut();
    state.mutations += 1;
    let head = state.head.clone().ok_or_else(|| Self::fail("commit", "no branch checked out"))?;
    let id = format!("c{}", state.commits.len());
    let parent = state.branches.get(&head).cloned();
    state.commits.push(MemoryCommit {
      id: id.clone(),
      message: message.to_string(),
      parent,
      timestamp,
      files,
    });
    state.branches.insert(head, id.clone());
    Ok(id)
  }

  fn create_branch(&self, name: &str, from: Option<&str>) -> ReplayResult<()> {
    let mut state = self.state.borrow_mut();
    state.mutations += 1;
    if state.branches.contains_key(name) {
      return Err(Self::fail("branch", "branch already exists").into());
    }
    let from = match from {
      Some(id) => id.to_string(),
      None => {
        let head = state.head.clone().unwrap_or_default();
        state.branches.get(&head).cloned().ok_or_else(|| Self::fail("branch", "no HEAD"))?
      }
    };
    state.branches.insert(name.to_string(), from);
    Ok(())
  }

  fn delete_branch(&self, name: &str) -> ReplayResult<()> {
    let mut state = self.state.borrow_mut();
    state.mutations += 1;
    if state.head.as_deref() == Some(name) {
      return Err(Self::fail("branch -D", "cannot delete the checked out branch").into());
    }
    state
      .branches
      .remove(name)
      .ok_or_else(|| Self::fail("branch -D", "branch not found"))?;
    Ok(())
  }

  fn branch_exists(&self, name: &str) -> ReplayResult<bool> {
    Ok(self.state.borrow().branches.contains_key(name))
  }

  fn checkout(&self, name: &str) -> ReplayResult<()> {
    let files = {
      let mut state = self.state.borrow_mut();
      state.mutations += 1;
      let id = state
        .branches
        .get(name)
        .cloned()
        .ok_or_else(|| StoreError::BranchNotFound { name: name.to_string() })?;
      state.head = Some(name.to_string());
      state.commits.iter().find(|c| c.id == id).map(|c| c.files.clone()).unwrap_or_default()
    };
    self.restore(&files);
    Ok(())
  }

  fn resolve_branch_head(&self, name: &str) -> ReplayResult<String> {
    Ok(
      self
        .state
        .borrow()
        .branches
        .get(name)
        .cloned()
        .ok_or_else(|| StoreError::BranchNotFound { name: name.to_string() })?,
    )
  }

  fn rebase_onto(&self, base: &str, target: &str, from: &str) -> ReplayResult<()> {
    let mut state = self.state.borrow_mut();
    state.mutations += 1;
    if self.fail_rebase.get() {
      return Err(Self::fail("rebase", "simulated failure").into());
    }
    let new_base = state
      .branches
      .get(base)
      .cloned()
      .ok_or_else(|| StoreError::BranchNotFound { name: base.to_string() })?;
    let old_head = state
      .branches
      .get(target)
      .cloned()
      .ok_or_else(|| StoreError::BranchNotFound { name: target.to_string() })?;
    if !Self::ancestors(&state, &old_head).contains(from) {
      return Err(Self::fail("rebase", "commit is not on the target branch").into());
    }

    let reachable = Self::reachable(&state);
    let mut remap: HashMap<String, String> = HashMap::new();
    let originals: Vec<MemoryCommit> = state.commits.clone();
    for commit in originals.into_iter().filter(|c| reachable.contains(&c.id)) {
      let parent = if commit.id == from {
        Some(new_base.clone())
      } else if let Some(moved) = commit.parent.as_ref().and_then(|p| remap.get(p)) {
        Some(moved.clone())
      } else {
        continue;
      };
      let id = format!("c{}", state.commits.len());
      remap.insert(commit.id.clone(), id.clone());
      state.commits.push(MemoryCommit {
        id,
        parent,
        ..commit
      });
    }

    for head in state.branches.values_mut() {
      if let Some(new_head) = remap.get(head.as_str()) {
        *head = new_head.clone();
      }
    }
    Ok(())
  }

  fn list_commits(&self) -> ReplayResult<Vec<CommitRecord>> {
    let state = self.state.borrow();
    let reachable = Self::reachable(&state);
    Ok(
      state
        .commits
        .iter()
        .rev()
        .filter(|c| reachable.contains(&c.id))
        .map(|c| CommitRecord {
          id: c.id.clone(),
          message: c.message.clone(),
        })
        .collect(),
    )
  }
}
