//! Progress indicator for the replay loop
//!
//! Uses `linya`, which draws to stderr and leaves stdout clean for `--json`

use linya::{Bar, Progress};

/// Progress bar over the releases of one run
pub struct CommitProgress {
  progress: Progress,
  bar: Bar,
}

impl CommitProgress {
  /// Create a new progress bar for processing releases
  pub fn new(total: usize, label: impl Into<String>) -> Self {
    let mut progress = Progress::new();
    let bar = progress.bar(total, label.into());
    Self { progress, bar }
  }

  /// Increment progress by 1
  pub fn inc(&mut self) {
    self.progress.inc_and_draw(&self.bar, 1);
  }
}
