use crate::core::context::ReplayContext;
use crate::core::engine::{ReconstructionEngine, ReplaySummary};
use crate::core::error::{ExtractionError, ReplayResult};
use crate::core::plan::ReplayPlan;
use crate::release::JsonNormalizer;

/// Run the replay command
///
/// Without `apply` this only prints the plan.
pub fn run_replay(ctx: &ReplayContext, apply: bool, json: bool, keep_going: bool) -> ReplayResult<()> {
  let mut correlation = ctx.scan()?;
  let plan = ReplayPlan::build(&ctx.tree, &correlation, &ctx.store)?;

  if !apply {
    if json {
      println!("{}", plan.to_json()?);
    } else {
      println!("{}", plan.to_human_readable());
      if !plan.is_empty() {
        println!("💡 Run with --apply to replay onto {}", ctx.repository_path().display());
      }
    }
    return Ok(());
  }

  if !json {
    println!("{}", plan.to_human_readable());
  }

  let normalizer = JsonNormalizer;
  let summary = ReconstructionEngine::new(&ctx.store, &ctx.source)
    .with_translator(&normalizer)
    .keep_going(keep_going)
    .show_progress(!json && !plan.is_empty())
    .run(&ctx.tree, &mut correlation)?;

  if json {
    println!("{}", serde_json::to_string_pretty(&summary)?);
  } else {
    print_summary(&summary);
  }

  if let Some(first) = summary.failed.first() {
    return Err(
      ExtractionError::Failed {
        release: first.name.clone(),
        reason: format!(
          "{} ({} release(s) failed, {} blocked)",
          first.reason,
          summary.failed.len(),
          summary.blocked.len()
        ),
      }
      .into(),
    );
  }

  Ok(())
}

fn print_summary(summary: &ReplaySummary) {
  for release in &summary.committed {
    if release.inserted {
      println!("   ↪️  {} inserted into {} after {}", release.name, release.branch, release.parent);
    } else {
      println!("   ✅ {} committed on {}", release.name, release.branch);
    }
  }

  for failed in &summary.failed {
    println!("   ❌ {}: {}", failed.name, failed.reason);
  }
  for blocked in &summary.blocked {
    println!("   ⏸️  {} skipped (ancestor failed)", blocked);
  }

  println!(
    "\n📊 {} committed ({} inserted), {} already present",
    summary.committed.len(),
    summary.inserted(),
    summary.already_present
  );
  if summary.rescans > 0 {
    println!("   History was rewritten {} time(s); commit ids downstream changed", summary.rescans);
  }
  if summary.is_clean() {
    println!("✅ Replay complete");
  }
}
