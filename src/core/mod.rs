//! Core engine for release-replay
//!
//! - **config**: replay.toml parsing and validation
//! - **context**: configuration, manifest, policy and version tree loaded once per command
//! - **correlation**: release name <-> commit id map, always derived from history
//! - **engine**: replays a version tree onto a history store, inserting out-of-order releases
//! - **error**: error types with contextual help messages and exit codes
//! - **plan**: dry-run plans with stable ids
//! - **vcs**: history store abstraction and the system git backend

pub mod config;
pub mod context;
pub mod correlation;
pub mod engine;
pub mod error;
pub mod plan;
pub mod vcs;
