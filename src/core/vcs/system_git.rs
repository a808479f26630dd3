//! System git backend
//!
//! Every primitive is one `git` subprocess:
//! - Isolated environment (PATH and HOME only, fixed identity)
//! - Output captured in full, exit status checked
//! - Child killed on timeout or when the caller unwinds

use crate::core::config::StoreConfig;
use crate::core::error::{ReplayResult, StoreError};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Git backend using the system git binary
pub struct SystemGit {
  /// Working tree root
  pub(crate) work_tree: PathBuf,

  program: String,
  timeout: Option<Duration>,
  author_name: String,
  author_email: String,
}

impl SystemGit {
  /// Bind to a working tree; the repository does not have to exist yet
  pub fn new(work_tree: &Path, config: &StoreConfig) -> Self {
    Self {
      work_tree: work_tree.to_path_buf(),
      program: config.program.clone(),
      timeout: (config.timeout_secs > 0).then(|| Duration::from_secs(config.timeout_secs)),
      author_name: config.author_name.clone(),
      author_email: config.author_email.clone(),
    }
  }

  /// Create a safe git command with isolated environment
  ///
  /// - Runs inside the working tree
  /// - Clears environment variables, whitelists PATH and HOME
  /// - Pins author and committer identity
  /// - Adds safe configuration overrides
  pub(crate) fn git_cmd(&self) -> Command {
    let mut cmd = Command::new(&self.program);

    cmd.arg("-C").arg(&self.work_tree);

    // Isolated environment (don't trust global config)
    cmd.env_clear();
    if let Ok(path) = std::env::var("PATH") {
      cmd.env("PATH", path);
    }
    if let Ok(home) = std::env::var("HOME") {
      cmd.env("HOME", home);
    }
    cmd.env("GIT_CONFIG_NOSYSTEM", "1");
    cmd.env("GIT_AUTHOR_NAME", &self.author_name);
    cmd.env("GIT_AUTHOR_EMAIL", &self.author_email);
    cmd.env("GIT_COMMITTER_NAME", &self.author_name);
    cmd.env("GIT_COMMITTER_EMAIL", &self.author_email);

    // Force safe behavior (override user config)
    cmd.arg("-c").arg("advice.detachedHead=false");
    cmd.arg("-c").arg("core.quotePath=false");
    cmd.arg("-c").arg("core.autocrlf=false");
    cmd.arg("-c").arg("commit.gpgSign=false");

    cmd
  }

  /// Run a command, failing on non-zero exit; returns trimmed stdout
  pub(crate) fn run(&self, operation: &str, cmd: Command) -> ReplayResult<String> {
    let output = self.output(operation, cmd)?;

    if !output.status.success() {
      return Err(
        StoreError::CommandFailed {
          operation: operation.to_string(),
          stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into(),
      );
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  /// Spawn, wait (bounded by the timeout), and capture output
  pub(crate) fn output(&self, operation: &str, mut cmd: Command) -> ReplayResult<Output> {
    debug!(operation, "git");

    cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
    let child = cmd.spawn().map_err(|e| StoreError::Spawn {
      program: self.program.clone(),
      reason: e.to_string(),
    })?;
    let mut guard = ChildGuard(Some(child));

    let stdout = drain(guard.child().stdout.take());
    let stderr = drain(guard.child().stderr.take());

    let deadline = self.timeout.map(|t| Instant::now() + t);
    let status = loop {
      if let Some(status) = guard.child().try_wait()? {
        break status;
      }
      if let Some(deadline) = deadline
        && Instant::now() >= deadline
      {
        guard.kill();
        return Err(
          StoreError::Timeout {
            operation: operation.to_string(),
            secs: self.timeout.map(|t| t.as_secs()).unwrap_or_default(),
          }
          .into(),
        );
      }
      thread::sleep(Duration::from_millis(5));
    };
    guard.release();

    Ok(Output {
      status,
      stdout: stdout.join().unwrap_or_default(),
      stderr: stderr.join().unwrap_or_default(),
    })
  }
}

/// Kills the child unless it was observed to exit
struct ChildGuard(Option<Child>);

impl ChildGuard {
  fn child(&mut self) -> &mut Child {
    self.0.as_mut().expect("child is present until released")
  }

  fn kill(&mut self) {
    if let Some(mut child) = self.0.take() {
      let _ = child.kill();
      let _ = child.wait();
    }
  }

  fn release(&mut self) {
    self.0 = None;
  }
}

impl Drop for ChildGuard {
  fn drop(&mut self) {
    self.kill();
  }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
  thread::spawn(move || {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
      let _ = pipe.read_to_end(&mut buf);
    }
    buf
  })
}
