use crate::core::config::{BranchRule, ReplayConfig};
use crate::core::error::{ReplayError, ReplayResult, ResultExt};
use std::fs;
use std::path::{Path, PathBuf};

const MANIFEST_TEMPLATE: &str = r#"# One entry per historical release.
# `path` is a directory or a single file, relative to this manifest.
#
# [[release]]
# name = "1.0"
# time = "2011-11-18T00:00:00Z"
# path = "artifacts/1.0"
"#;

/// Run the init command
pub fn run_init(config_dir: &Path, force: bool) -> ReplayResult<()> {
  if ReplayConfig::exists(config_dir) && !force {
    return Err(ReplayError::with_help(
      format!("replay.toml already exists in {}", config_dir.display()),
      "Use --force to overwrite it",
    ));
  }

  fs::create_dir_all(config_dir)
    .with_context(|| format!("Failed to create config directory {}", config_dir.display()))?;

  let mut config = ReplayConfig::new(PathBuf::from("history"));
  config.policy.branches.push(BranchRule {
    pattern: r"^(\d+\.\d+)".to_string(),
    branch: "$1".to_string(),
  });
  config.save(config_dir)?;
  println!("✅ Created {}", config_dir.join("replay.toml").display());

  let manifest = config.manifest_path(config_dir);
  if manifest.exists() {
    println!("   Keeping existing {}", manifest.display());
  } else {
    fs::write(&manifest, MANIFEST_TEMPLATE).with_context(|| format!("Failed to write {}", manifest.display()))?;
    println!("✅ Created {}", manifest.display());
  }

  println!("\n💡 Next steps:");
  println!("   1. List your releases in {}", manifest.display());
  println!("   2. Adjust [[policy.branches]] so every release maps to a branch");
  println!("   3. Preview with: release-replay tree");
  println!("   4. Replay with: release-replay run --apply");

  Ok(())
}
