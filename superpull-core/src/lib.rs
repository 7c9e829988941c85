//! Superpull Core - bulk synchronisation of many git working copies
//!
//! This crate provides the subprocess throttle pool and the local side of
//! the pull/clone workflows: scanning for working copies, deriving folder
//! names from clone URLs and rewriting submodules as sibling links.

pub mod batch;
pub mod config;
pub mod error;
pub mod git;
pub mod pool;
pub mod sanitize;
pub mod scan;
pub mod secrets;

pub use batch::{clone_all, pull_all, BatchReport, CloneOptions, Skipped};
pub use config::{AuthScheme, CliOverrides, Config, GitHubConfig, PoolConfig};
pub use error::{Error, Result};
pub use git::{link_submodules, LinkOutcome, SubmoduleLink};
pub use pool::{RunSummary, SyncTask, TaskOutcome, TerminalState, ThrottlePool};
pub use sanitize::sanitize;
pub use scan::scan;
pub use secrets::Secrets;
pub use tokio_util::sync::CancellationToken;
