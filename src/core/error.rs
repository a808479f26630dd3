//! Error types for release-replay with contextual messages and exit codes
//!
//! Errors are grouped by how the run must react to them:
//!
//! - **Config**: the input cannot produce a valid version tree. Always fatal and
//!   always raised before the history store is touched.
//! - **Store**: a history store primitive failed. Fatal, because later decisions
//!   depend on repository state we can no longer describe.
//! - **Extraction**: one release could not be materialised. Aborts that release;
//!   the caller decides whether the run continues.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Exit codes for release-replay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
  /// User error (config, ordering rules, manifest)
  User = 1,
  /// System error (git, I/O)
  System = 2,
  /// A release artifact could not be extracted
  Extraction = 3,
}

impl ExitCode {
  /// Convert to i32 for process exit
  pub fn as_i32(self) -> i32 {
    self as i32
  }
}

/// Main error type for release-replay
#[derive(Debug)]
pub enum ReplayError {
  /// Configuration and ordering errors
  Config(ConfigError),

  /// History store (git) errors
  Store(StoreError),

  /// Release extraction errors
  Extraction(ExtractionError),

  /// I/O errors
  Io(io::Error),

  /// Generic error with message and optional context
  Message {
    message: String,
    context: Option<String>,
    help: Option<String>,
  },
}

impl ReplayError {
  /// Create a simple error message
  pub fn message(msg: impl Into<String>) -> Self {
    ReplayError::Message {
      message: msg.into(),
      context: None,
      help: None,
    }
  }

  /// Create an error with help text
  pub fn with_help(msg: impl Into<String>, help: impl Into<String>) -> Self {
    ReplayError::Message {
      message: msg.into(),
      context: None,
      help: Some(help.into()),
    }
  }

  /// Add context to an existing error
  pub fn context(self, ctx: impl Into<String>) -> Self {
    let ctx_str = ctx.into();
    match self {
      ReplayError::Message { message, context, help } => ReplayError::Message {
        message,
        context: Some(context.map(|c| format!("{}\n{}", ctx_str, c)).unwrap_or(ctx_str)),
        help,
      },
      ReplayError::Io(err) => ReplayError::Message {
        message: format!("I/O error: {}", err),
        context: Some(ctx_str),
        help: None,
      },
      _ => self,
    }
  }

  /// Get the appropriate exit code for this error
  pub fn exit_code(&self) -> ExitCode {
    match self {
      ReplayError::Config(_) => ExitCode::User,
      ReplayError::Store(_) => ExitCode::System,
      ReplayError::Extraction(_) => ExitCode::Extraction,
      ReplayError::Io(_) => ExitCode::System,
      ReplayError::Message { .. } => ExitCode::User,
    }
  }

  /// Get contextual help message for this error
  pub fn help_message(&self) -> Option<String> {
    match self {
      ReplayError::Config(e) => e.help_message(),
      ReplayError::Store(e) => e.help_message(),
      ReplayError::Extraction(_) => {
        Some("Fix the artifact and re-run; releases already committed are skipped.".to_string())
      }
      ReplayError::Message { help, .. } => help.clone(),
      _ => None,
    }
  }

  /// True when this error only affects a single release
  pub fn is_extraction(&self) -> bool {
    matches!(self, ReplayError::Extraction(_))
  }
}

impl fmt::Display for ReplayError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ReplayError::Config(e) => write!(f, "{}", e),
      ReplayError::Store(e) => write!(f, "{}", e),
      ReplayError::Extraction(e) => write!(f, "{}", e),
      ReplayError::Io(e) => write!(f, "I/O error: {}", e),
      ReplayError::Message { message, context, .. } => {
        write!(f, "{}", message)?;
        if let Some(ctx) = context {
          write!(f, "\n{}", ctx)?;
        }
        Ok(())
      }
    }
  }
}

impl std::error::Error for ReplayError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      ReplayError::Io(e) => Some(e),
      _ => None,
    }
  }
}

impl From<io::Error> for ReplayError {
  fn from(err: io::Error) -> Self {
    ReplayError::Io(err)
  }
}

impl From<String> for ReplayError {
  fn from(msg: String) -> Self {
    ReplayError::message(msg)
  }
}

impl From<&str> for ReplayError {
  fn from(msg: &str) -> Self {
    ReplayError::message(msg)
  }
}

impl From<ConfigError> for ReplayError {
  fn from(err: ConfigError) -> Self {
    ReplayError::Config(err)
  }
}

impl From<StoreError> for ReplayError {
  fn from(err: StoreError) -> Self {
    ReplayError::Store(err)
  }
}

impl From<ExtractionError> for ReplayError {
  fn from(err: ExtractionError) -> Self {
    ReplayError::Extraction(err)
  }
}

impl From<toml_edit::de::Error> for ReplayError {
  fn from(err: toml_edit::de::Error) -> Self {
    ReplayError::message(format!("TOML deserialization error: {}", err))
  }
}

impl From<toml_edit::ser::Error> for ReplayError {
  fn from(err: toml_edit::ser::Error) -> Self {
    ReplayError::message(format!("TOML serialization error: {}", err))
  }
}

impl From<serde_json::Error> for ReplayError {
  fn from(err: serde_json::Error) -> Self {
    ReplayError::message(format!("JSON error: {}", err))
  }
}

impl From<std::string::FromUtf8Error> for ReplayError {
  fn from(err: std::string::FromUtf8Error) -> Self {
    ReplayError::message(format!("UTF-8 conversion error: {}", err))
  }
}

impl From<std::path::StripPrefixError> for ReplayError {
  fn from(err: std::path::StripPrefixError) -> Self {
    ReplayError::message(format!("Path strip prefix error: {}", err))
  }
}

/// Configuration-related errors
#[derive(Debug)]
pub enum ConfigError {
  /// replay.toml not found
  NotFound { dir: PathBuf },

  /// A field failed validation
  Invalid { field: String, reason: String },

  /// No branch rule or snapshot window matched a release
  UnresolvedBranch { release: String },

  /// No ordering strategy could tell two releases apart
  AmbiguousOrder { left: String, right: String },

  /// The strategies order a set of releases in a cycle
  InconsistentOrder { earlier: String, later: String },

  /// An explicit parent names a release that is not part of the tree
  UnknownParent { release: String, parent: String },

  /// Parent edges do not form a tree rooted at the earliest release
  InvalidTree { reason: String },

  /// The same release name appears twice in the manifest
  DuplicateRelease { name: String },
}

impl ConfigError {
  fn help_message(&self) -> Option<String> {
    match self {
      ConfigError::NotFound { .. } => Some("Run `release-replay init` to create a configuration file.".to_string()),
      ConfigError::UnresolvedBranch { release } => Some(format!(
        "Add a [[policy.branches]] rule or a [[policy.snapshot_windows]] entry that covers '{}'.",
        release
      )),
      ConfigError::AmbiguousOrder { left, right } => Some(format!(
        "List '{}' and '{}' in policy.order, or give them distinct release times.",
        left, right
      )),
      ConfigError::InconsistentOrder { .. } => Some(
        "policy.order must agree with the strategies after 'listed'; list every release that conflicts with them."
          .to_string(),
      ),
      ConfigError::UnknownParent { parent, .. } => Some(format!(
        "Check policy.parents: '{}' is missing from the manifest or excluded by policy.skip.",
        parent
      )),
      ConfigError::InvalidTree { .. } => Some("Review policy.parents for overrides that create a cycle.".to_string()),
      _ => None,
    }
  }
}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigError::NotFound { dir } => {
        write!(
          f,
          "No release-replay configuration found.\nExpected file: {}/replay.toml",
          dir.display()
        )
      }
      ConfigError::Invalid { field, reason } => write!(f, "Invalid configuration for {}: {}", field, reason),
      ConfigError::UnresolvedBranch { release } => {
        write!(f, "Release '{}' does not belong to any release branch", release)
      }
      ConfigError::AmbiguousOrder { left, right } => {
        write!(f, "Ambiguous ordering: '{}' and '{}' compare as equal", left, right)
      }
      ConfigError::InconsistentOrder { earlier, later } => write!(
        f,
        "Inconsistent ordering: '{}' sorts before '{}' but the policy puts it after",
        earlier, later
      ),
      ConfigError::UnknownParent { release, parent } => {
        write!(f, "Release '{}' has explicit parent '{}' which is not a known release", release, parent)
      }
      ConfigError::InvalidTree { reason } => write!(f, "Version tree is not a tree: {}", reason),
      ConfigError::DuplicateRelease { name } => write!(f, "Release '{}' is listed more than once", name),
    }
  }
}

/// History store (git) errors
#[derive(Debug)]
pub enum StoreError {
  /// Git command exited non-zero
  CommandFailed { operation: String, stderr: String },

  /// Git could not be started at all
  Spawn { program: String, reason: String },

  /// Git did not finish within the configured timeout
  Timeout { operation: String, secs: u64 },

  /// Target directory is not a git repository
  RepoNotFound { path: PathBuf },

  /// Branch does not exist
  BranchNotFound { name: String },
}

impl StoreError {
  fn help_message(&self) -> Option<String> {
    match self {
      StoreError::CommandFailed { operation, .. } if operation.contains("rebase") => Some(
        "The repository may be half-rewritten. Inspect it with `git log --all --graph` before re-running.".to_string(),
      ),
      StoreError::Spawn { program, .. } => Some(format!("Make sure '{}' is installed and on PATH.", program)),
      StoreError::Timeout { .. } => Some("Raise store.timeout_secs in replay.toml, or set it to 0.".to_string()),
      StoreError::RepoNotFound { path } => Some(format!(
        "Run `release-replay run --apply` to create the repository at {}",
        path.display()
      )),
      _ => None,
    }
  }
}

impl fmt::Display for StoreError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StoreError::CommandFailed { operation, stderr } => {
        write!(f, "Git command failed: {}\n{}", operation, stderr)
      }
      StoreError::Spawn { program, reason } => write!(f, "Failed to run {}: {}", program, reason),
      StoreError::Timeout { operation, secs } => write!(f, "Git command timed out after {}s: {}", secs, operation),
      StoreError::RepoNotFound { path } => write!(f, "Git repository not found at: {}", path.display()),
      StoreError::BranchNotFound { name } => write!(f, "Branch not found: {}", name),
    }
  }
}

/// Release extraction errors
#[derive(Debug)]
pub enum ExtractionError {
  /// Artifact path does not exist
  Missing { release: String, path: PathBuf },

  /// Copying the artifact failed
  Failed { release: String, reason: String },
}

impl fmt::Display for ExtractionError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ExtractionError::Missing { release, path } => {
        write!(f, "Artifact for release '{}' not found at {}", release, path.display())
      }
      ExtractionError::Failed { release, reason } => write!(f, "Failed to extract '{}': {}", release, reason),
    }
  }
}

/// Result type alias for release-replay
pub type ReplayResult<T> = Result<T, ReplayError>;

/// Helper trait to add context to Results
pub trait ResultExt<T> {
  /// Add context to an error result
  fn context(self, ctx: impl Into<String>) -> ReplayResult<T>;

  /// Add context using a closure (lazy evaluation)
  fn with_context<F>(self, f: F) -> ReplayResult<T>
  where
    F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
  E: Into<ReplayError>,
{
  fn context(self, ctx: impl Into<String>) -> ReplayResult<T> {
    self.map_err(|e| e.into().context(ctx))
  }

  fn with_context<F>(self, f: F) -> ReplayResult<T>
  where
    F: FnOnce() -> String,
  {
    self.map_err(|e| e.into().context(f()))
  }
}

/// Pretty-print an error to stderr with help text
pub fn print_error(error: &ReplayError) {
  eprintln!("\n❌ {}\n", error);

  if let Some(help) = error.help_message() {
    eprintln!("💡 Help: {}\n", help);
  }
}
