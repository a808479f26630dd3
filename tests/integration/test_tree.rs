//! Tests for the `tree` command

use crate::helpers::*;
use anyhow::Result;

fn parent_of(tree: &serde_json::Value, name: &str) -> Option<String> {
  tree["order"]
    .as_array()?
    .iter()
    .find(|entry| entry["name"] == name)?["parent"]
    .as_str()
    .map(String::from)
}

#[test]
fn test_tree_links_branches_by_time() -> Result<()> {
  let mut project = TestProject::new()?;
  project.add_release("1.0", "2011-11-18T00:00:00Z", &[("a.txt", "1.0")])?;
  project.add_release("1.0.1", "2011-12-01T00:00:00Z", &[("a.txt", "1.0.1")])?;
  project.add_release("1.1", "2012-01-12T00:00:00Z", &[("a.txt", "1.1")])?;

  let output = run_release_replay(&project.path, &["tree", "--json"])?;
  let tree = stdout_json(&output)?;

  assert_eq!(tree["root"], "1.0");
  assert_eq!(tree["branches"].as_array().map(Vec::len), Some(2));
  assert_eq!(parent_of(&tree, "1.0"), None);
  assert_eq!(parent_of(&tree, "1.0.1").as_deref(), Some("1.0"));
  assert_eq!(parent_of(&tree, "1.1").as_deref(), Some("1.0.1"));

  // Nothing is written by tree
  assert!(!project.repo().exists());
  Ok(())
}

#[test]
fn test_tree_applies_explicit_parent() -> Result<()> {
  let mut project = TestProject::with_policy("[policy.parents]\n\"1.1\" = \"1.0\"\n")?;
  project.add_release("1.0", "2011-11-18T00:00:00Z", &[("a.txt", "1.0")])?;
  project.add_release("1.0.1", "2011-12-01T00:00:00Z", &[("a.txt", "1.0.1")])?;
  project.add_release("1.1", "2012-01-12T00:00:00Z", &[("a.txt", "1.1")])?;

  let tree = stdout_json(&run_release_replay(&project.path, &["tree", "--json"])?)?;
  assert_eq!(parent_of(&tree, "1.1").as_deref(), Some("1.0"));
  Ok(())
}

#[test]
fn test_unresolved_branch_is_a_config_error() -> Result<()> {
  let mut project = TestProject::new()?;
  project.add_release("1.0", "2011-11-18T00:00:00Z", &[("a.txt", "1.0")])?;
  project.add_release("beta", "2011-12-01T00:00:00Z", &[("a.txt", "beta")])?;

  let output = release_replay(&project.path, &["tree"])?;
  assert_eq!(output.status.code(), Some(1));
  assert!(String::from_utf8_lossy(&output.stderr).contains("beta"));
  Ok(())
}

#[test]
fn test_equal_times_in_one_branch_are_ambiguous() -> Result<()> {
  let mut project = TestProject::new()?;
  project.add_release("1.0", "2011-11-18T00:00:00Z", &[("a.txt", "1.0")])?;
  project.add_release("1.0.1", "2011-11-18T00:00:00Z", &[("a.txt", "1.0.1")])?;

  let output = release_replay(&project.path, &["run", "--apply"])?;
  assert_eq!(output.status.code(), Some(1));
  assert!(!project.repo().exists());
  Ok(())
}
