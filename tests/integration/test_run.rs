//! Tests for the `run` command

use crate::helpers::*;
use anyhow::Result;
use std::fs;

const T_1_0: &str = "2011-11-18T00:00:00Z";
const T_1_0_1: &str = "2011-11-25T00:00:00Z";
const T_1_0_2: &str = "2011-12-01T00:00:00Z";
const T_1_1: &str = "2012-01-12T00:00:00Z";

fn three_releases() -> Result<TestProject> {
  let mut project = TestProject::new()?;
  project.add_release("1.0", T_1_0, &[("a.txt", "1.0"), ("old.txt", "gone soon")])?;
  project.add_release("1.0.2", T_1_0_2, &[("a.txt", "1.0.2")])?;
  project.add_release("1.1", T_1_1, &[("a.txt", "1.1"), ("lib/b.txt", "b")])?;
  Ok(project)
}

#[test]
fn test_dry_run_prints_plan_without_writing() -> Result<()> {
  let project = three_releases()?;

  let output = run_release_replay(&project.path, &["run"])?;
  let stdout = String::from_utf8_lossy(&output.stdout);
  assert!(stdout.contains("Initialize repository"), "{}", stdout);
  assert!(stdout.contains("Commit 1.0.2 on 1.0"), "{}", stdout);
  assert!(!project.repo().exists());

  let plan = stdout_json(&run_release_replay(&project.path, &["run", "--json"])?)?;
  assert_eq!(plan["actions"][0]["type"], "init_repository");
  assert_eq!(plan["actions"].as_array().map(Vec::len), Some(4));
  Ok(())
}

#[test]
fn test_apply_builds_one_branch_per_release_line() -> Result<()> {
  let project = three_releases()?;
  run_release_replay(&project.path, &["run", "--apply"])?;

  let mut branches = project.branches()?;
  branches.sort();
  assert_eq!(branches, vec!["1.0", "1.1", "main"]);

  assert_eq!(project.lineage("1.0")?, vec!["1.0.2", "1.0", "Initial commit"]);
  assert_eq!(project.lineage("1.1")?, vec!["1.1", "1.0.2", "1.0", "Initial commit"]);
  assert_eq!(project.lineage("main")?, vec!["Initial commit"]);

  let first = project.commit_of("1.0")?;
  assert_eq!(project.git(&["log", "-1", "--format=%at", &first])?, "1321574400");
  assert_eq!(project.show(&first, "old.txt")?, "gone soon");
  assert_eq!(project.show(&first, ".release")?, "1.0");
  assert!(project.show(&first, ".gitignore").is_ok());

  // Files absent from a release are removed from its commit
  assert!(project.show("1.0", "old.txt").is_err());
  assert_eq!(project.show("1.1", "lib/b.txt")?, "b");
  Ok(())
}

#[test]
fn test_rerun_changes_nothing() -> Result<()> {
  let project = three_releases()?;
  run_release_replay(&project.path, &["run", "--apply"])?;
  let heads = project.git(&["for-each-ref", "--format=%(objectname)", "refs/heads"])?;

  let summary = stdout_json(&run_release_replay(&project.path, &["run", "--apply", "--json"])?)?;
  assert_eq!(summary["committed"].as_array().map(Vec::len), Some(0));
  assert_eq!(summary["already_present"], 3);
  assert_eq!(project.git(&["for-each-ref", "--format=%(objectname)", "refs/heads"])?, heads);

  let plan = stdout_json(&run_release_replay(&project.path, &["run", "--json"])?)?;
  assert_eq!(plan["actions"].as_array().map(Vec::len), Some(0));
  Ok(())
}

#[test]
fn test_late_release_is_inserted_below_existing_commits() -> Result<()> {
  let mut project = three_releases()?;
  run_release_replay(&project.path, &["run", "--apply"])?;

  let old_root = project.commit_of("1.0")?;
  let old_102 = project.commit_of("1.0.2")?;
  let old_11 = project.commit_of("1.1")?;
  let tree_102 = project.git(&["rev-parse", &format!("{}^{{tree}}", old_102)])?;
  let tree_11 = project.git(&["rev-parse", &format!("{}^{{tree}}", old_11)])?;

  project.add_release("1.0.1", T_1_0_1, &[("a.txt", "1.0.1")])?;

  let plan = stdout_json(&run_release_replay(&project.path, &["run", "--json"])?)?;
  assert_eq!(plan["actions"][0]["type"], "insert");
  assert_eq!(plan["actions"][0]["parent"], "1.0");

  run_release_replay(&project.path, &["run", "--apply"])?;

  assert_eq!(project.lineage("1.0")?, vec!["1.0.2", "1.0.1", "1.0", "Initial commit"]);
  assert_eq!(project.lineage("1.1")?, vec!["1.1", "1.0.2", "1.0.1", "1.0", "Initial commit"]);

  // Ids downstream of the insertion change, contents and dates do not
  let new_102 = project.commit_of("1.0.2")?;
  let new_11 = project.commit_of("1.1")?;
  assert_eq!(project.commit_of("1.0")?, old_root);
  assert_ne!(new_102, old_102);
  assert_ne!(new_11, old_11);
  assert_eq!(project.git(&["rev-parse", &format!("{}^{{tree}}", new_102)])?, tree_102);
  assert_eq!(project.git(&["rev-parse", &format!("{}^{{tree}}", new_11)])?, tree_11);
  assert_eq!(project.git(&["log", "-1", "--format=%at", &new_102])?, "1322697600");
  assert_eq!(project.show(&project.commit_of("1.0.1")?, "a.txt")?, "1.0.1");

  assert!(!project.branches()?.iter().any(|b| b.contains("insert")));

  let summary = stdout_json(&run_release_replay(&project.path, &["run", "--apply", "--json"])?)?;
  assert_eq!(summary["already_present"], 4);
  Ok(())
}

#[test]
fn test_late_branch_head_leaves_the_parent_branch_untouched() -> Result<()> {
  let mut project = TestProject::new()?;
  project.add_release("1.0", T_1_0, &[("a.txt", "1.0")])?;
  project.add_release("1.0.1", T_1_0_1, &[("a.txt", "1.0.1")])?;
  project.add_release("1.0.2", T_1_0_2, &[("a.txt", "1.0.2")])?;
  project.add_release("1.1", T_1_1, &[("a.txt", "1.1")])?;
  run_release_replay(&project.path, &["run", "--apply"])?;
  let old_102 = project.commit_of("1.0.2")?;

  // Forks from 1.0.1, below the 1.0.2 commit that 1.1 sits on
  project.add_release("1.1-pre1", "2011-11-28T00:00:00Z", &[("a.txt", "1.1-pre1")])?;

  let plan = stdout_json(&run_release_replay(&project.path, &["run", "--json"])?)?;
  assert_eq!(plan["actions"][0]["type"], "insert");
  assert_eq!(plan["actions"][0]["parent"], "1.0.1");

  run_release_replay(&project.path, &["run", "--apply"])?;

  assert_eq!(project.lineage("1.0")?, vec!["1.0.2", "1.0.1", "1.0", "Initial commit"]);
  assert_eq!(project.lineage("1.1")?, vec!["1.1", "1.1-pre1", "1.0.1", "1.0", "Initial commit"]);
  assert_eq!(project.commit_of("1.0.2")?, old_102);
  assert_eq!(project.show("1.1", "a.txt")?, "1.1");
  assert!(!project.branches()?.iter().any(|b| b.contains("insert")));
  Ok(())
}

#[test]
fn test_new_earliest_release_goes_below_the_old_root() -> Result<()> {
  let mut project = TestProject::new()?;
  project.add_release("1.0.1", T_1_0_1, &[("a.txt", "1.0.1")])?;
  run_release_replay(&project.path, &["run", "--apply"])?;

  project.add_release("1.0", T_1_0, &[("a.txt", "1.0")])?;
  run_release_replay(&project.path, &["run", "--apply"])?;

  assert_eq!(project.lineage("1.0")?, vec!["1.0.1", "1.0", "Initial commit"]);
  assert_eq!(project.show("1.0", "a.txt")?, "1.0.1");
  Ok(())
}

#[test]
fn test_json_artifacts_are_normalized() -> Result<()> {
  let mut project = TestProject::new()?;
  project.add_release(
    "1.0",
    T_1_0,
    &[("data/items.json", r#"{"b":1,"a":{"d":2,"c":3}}"#), ("broken.json", "{not json")],
  )?;
  run_release_replay(&project.path, &["run", "--apply"])?;

  let items = project.show("1.0", "data/items.json")?;
  assert_eq!(items, "{\n  \"a\": {\n    \"c\": 3,\n    \"d\": 2\n  },\n  \"b\": 1\n}");
  assert_eq!(project.show("1.0", "broken.json")?, "{not json");
  Ok(())
}

#[test]
fn test_missing_artifact_stops_the_run() -> Result<()> {
  let mut project = TestProject::new()?;
  project.add_release("1.0", T_1_0, &[("a.txt", "1.0")])?;
  project.list_release("1.0.1", T_1_0_1)?;
  project.add_release("1.0.2", T_1_0_2, &[("a.txt", "1.0.2")])?;

  let output = release_replay(&project.path, &["run", "--apply"])?;
  assert_eq!(output.status.code(), Some(3));
  assert_eq!(project.lineage("1.0")?, vec!["1.0", "Initial commit"]);
  Ok(())
}

#[test]
fn test_keep_going_skips_descendants_of_missing_artifact() -> Result<()> {
  let mut project = TestProject::new()?;
  project.add_release("1.0", T_1_0, &[("a.txt", "1.0")])?;
  project.list_release("1.0.1", T_1_0_1)?;
  project.add_release("1.0.2", T_1_0_2, &[("a.txt", "1.0.2")])?;

  let output = release_replay(&project.path, &["run", "--apply", "--json", "--keep-going"])?;
  assert_eq!(output.status.code(), Some(3));

  let summary = stdout_json(&output)?;
  assert_eq!(summary["failed"][0]["name"], "1.0.1");
  assert_eq!(summary["blocked"][0], "1.0.2");
  assert_eq!(project.lineage("1.0")?, vec!["1.0", "Initial commit"]);

  // Once the artifact exists the next run picks up where this one stopped
  let artifact = project.path.join("artifacts").join("1.0.1");
  fs::create_dir_all(&artifact)?;
  fs::write(artifact.join("a.txt"), "1.0.1")?;
  run_release_replay(&project.path, &["run", "--apply"])?;
  assert_eq!(project.lineage("1.0")?, vec!["1.0.2", "1.0.1", "1.0", "Initial commit"]);
  Ok(())
}
