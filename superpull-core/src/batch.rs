//! The pull-all and clone-all workflows
//!
//! Both workflows turn a list of repositories into pool tasks, run them and
//! report what happened. Neither interprets git's own exit status.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::git::{clone_task, link_submodules, pull_task, with_credentials, SubmoduleLink};
use crate::pool::{RunSummary, SyncTask, ThrottlePool};
use crate::{sanitize, scan, PoolConfig, Result};

/// A repository left out of the batch, and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub name: String,
    pub reason: String,
}

/// Result of one workflow
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Repositories found (pull) or supplied (clone)
    pub found: usize,
    /// Repositories not handed to the pool
    pub skipped: Vec<Skipped>,
    /// Planned tasks, in submission order
    pub planned: Vec<SyncTask>,
    /// Pool outcomes; empty for a dry run
    pub summary: RunSummary,
    /// Submodule links made after cloning
    pub links: Vec<SubmoduleLink>,
}

impl BatchReport {
    /// A workflow succeeds when it had at least one repository to work on
    pub fn success(&self) -> bool {
        self.found > 0
    }
}

/// Options for [`clone_all`]
#[derive(Debug, Clone, Default)]
pub struct CloneOptions {
    /// Folder the clones are created in
    pub target_dir: PathBuf,
    /// Token embedded into clone URLs
    pub token: Option<String>,
    /// Rewrite submodules of the new clones as sibling links
    pub link_submodules: bool,
    /// Plan the tasks without running them
    pub dry_run: bool,
}

/// Run `git pull -r` in every working copy below `root`
///
/// Fails only when `root` does not exist.
pub async fn pull_all(
    root: &Path,
    recursive: bool,
    config: &PoolConfig,
    cancel: CancellationToken,
) -> Result<BatchReport> {
    let repos = scan(root, recursive)?;
    info!("Found {} repos.", repos.len());

    let tasks: Vec<SyncTask> = repos
        .iter()
        .map(|repo| pull_task(&config.git_path, repo))
        .collect();

    let pool = ThrottlePool::new(config).with_cancellation(cancel);
    let summary = pool.run(tasks.clone()).await;
    info!("Done: {:?}", summary.elapsed);

    Ok(BatchReport {
        found: repos.len(),
        planned: tasks,
        summary,
        ..BatchReport::default()
    })
}

/// Clone every URL into its own folder below `options.target_dir`
///
/// URLs are processed in sorted order. A URL whose folder already exists, or
/// whose folder name was already claimed by an earlier URL in this batch, is
/// skipped and never overwritten.
pub async fn clone_all(
    urls: &[String],
    options: &CloneOptions,
    config: &PoolConfig,
    cancel: CancellationToken,
) -> Result<BatchReport> {
    info!("Got {} repo urls.", urls.len());

    let mut urls = urls.to_vec();
    urls.sort();

    let mut report = BatchReport {
        found: urls.len(),
        ..BatchReport::default()
    };
    let mut claimed = HashSet::new();
    let mut targets = Vec::new();

    for url in &urls {
        let name = sanitize(url);
        let target = options.target_dir.join(&name);
        let mut skip = |reason: String| {
            report.skipped.push(Skipped {
                name: name.clone(),
                reason,
            })
        };

        if name.is_empty() {
            warn!("No folder name derivable from '{}'", url);
            skip("no folder name".to_string());
            continue;
        }

        if target.exists() {
            info!("Folder already exists: '{}'", target.display());
            skip("folder exists".to_string());
            continue;
        }

        if claimed.contains(&name) {
            warn!("Folder name '{}' already used by another repo, skipping '{}'", name, url);
            skip("folder name collision".to_string());
            continue;
        }

        let url_with_credentials = match with_credentials(url, options.token.as_deref()) {
            Ok(u) => u,
            Err(e) => {
                warn!("{}", e);
                skip(e.to_string());
                continue;
            }
        };
        // Only a URL that will actually be cloned claims its folder name
        claimed.insert(name.clone());

        report.planned.push(clone_task(
            &config.git_path,
            &name,
            url,
            &url_with_credentials,
            &target,
        ));
        targets.push((url.clone(), target));
    }

    if options.dry_run {
        for task in &report.planned {
            info!("[dry run] {}", task.description);
        }
        return Ok(report);
    }

    if !report.planned.is_empty() {
        std::fs::create_dir_all(&options.target_dir)?;
    }

    let pool = ThrottlePool::new(config).with_cancellation(cancel);
    report.summary = pool.run(report.planned.clone()).await;

    if options.link_submodules {
        report.links = link_submodules(&config.git_path, &targets).await;
    }

    info!("Done: {:?}", report.summary.elapsed);
    Ok(report)
}
