//! Integration tests: drive the compiled binary against real git repositories

mod helpers;
mod test_run;
mod test_tree;
