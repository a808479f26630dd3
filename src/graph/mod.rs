//! Release graph construction
//!
//! Built on petgraph: releases are nodes in an index arena, parent edges are
//! plain index reassignments.

pub mod version_tree;

pub use version_tree::{ReleaseBranch, ReleaseNode, VersionTree};
