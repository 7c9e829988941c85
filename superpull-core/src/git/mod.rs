//! Git command construction and post-clone processing
//!
//! This module builds the `git pull` and `git clone` tasks handed to the
//! throttle pool and rewrites submodules as links to sibling clones.

mod clone;
mod submodule;

pub use clone::{clone_task, pull_task, with_credentials};
pub use submodule::{link_submodules, parse_submodule_paths, LinkOutcome, SubmoduleLink};
