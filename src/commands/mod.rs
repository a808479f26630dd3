//! CLI commands for release-replay
//!
//! - **init**: write a starter replay.toml and release manifest
//! - **tree**: show branches, parents and the replay order
//! - **status**: compare the manifest with the target repository
//! - **run**: plan a replay (dry run) or apply it
//!
//! Every command except `init` takes a `&ReplayContext`.

pub mod init;
pub mod run;
pub mod status;
pub mod tree;

pub use init::run_init;
pub use run::run_replay;
pub use status::run_status;
pub use tree::run_tree;
