//! Rewriting submodules as links to sibling clones
//!
//! After a bulk clone, each submodule of a cloned repository usually has its
//! own clone next to it. Instead of initialising the submodule, its path is
//! replaced by a symbolic link to `../<path>`.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tokio::process::Command;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// What happened to one submodule path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// A correct link was already there; nothing was touched
    AlreadyLinked,
    /// Nothing existed at the path; a link was created
    Created,
    /// A different entry was deleted and replaced by the link
    Replaced,
    /// The path could not be linked
    Failed(String),
}

/// Record of one submodule path processed by [`link_submodules`]
#[derive(Debug, Clone)]
pub struct SubmoduleLink {
    pub repo_dir: PathBuf,
    pub path: String,
    pub outcome: LinkOutcome,
}

/// Extract submodule paths from `git submodule` output
///
/// Each line is `<status><hash> <path>[ (<describe>)]`. Lines without a space
/// are skipped.
pub fn parse_submodule_paths(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            let (_, rest) = line.trim_start().split_once(' ')?;
            let path = match rest.rfind(" (") {
                Some(index) if rest.ends_with(')') => &rest[..index],
                _ => rest,
            };
            let path = path.trim();
            (!path.is_empty()).then(|| path.to_string())
        })
        .collect()
}

/// Replace the submodules of every cloned repository by sibling links
///
/// `repos` pairs each clone URL with its local folder. Listings run
/// concurrently, one `git submodule` per folder. Missing folders and failing
/// listings are logged and skipped; nothing here aborts the batch.
pub async fn link_submodules(git: &str, repos: &[(String, PathBuf)]) -> Vec<SubmoduleLink> {
    let mut listings = JoinSet::new();

    for (url, dir) in repos {
        if !dir.is_dir() {
            warn!(url = %url, "Folder missing, skipping submodules: '{}'", dir.display());
            continue;
        }

        let git = git.to_string();
        let dir = dir.clone();
        listings.spawn(async move {
            let output = Command::new(&git)
                .arg("submodule")
                .current_dir(&dir)
                .output()
                .await;
            (dir, output)
        });
    }

    let mut links = Vec::new();
    while let Some(joined) = listings.join_next().await {
        let (dir, output) = match joined {
            Ok(result) => result,
            Err(e) => {
                warn!("Submodule listing task failed: {}", e);
                continue;
            }
        };

        let output = match output {
            Ok(output) if output.status.success() => output,
            Ok(output) => {
                warn!(
                    "git submodule failed in '{}': {}",
                    dir.display(),
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                continue;
            }
            Err(e) => {
                warn!("Failed to run git submodule in '{}': {}", dir.display(), e);
                continue;
            }
        };

        for path in parse_submodule_paths(&String::from_utf8_lossy(&output.stdout)) {
            let outcome = match link_one(&dir, &path) {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("Failed to link submodule '{}' in '{}': {}", path, dir.display(), e);
                    LinkOutcome::Failed(e.to_string())
                }
            };
            debug!(repo = %dir.display(), submodule = %path, outcome = ?outcome, "Submodule processed");
            links.push(SubmoduleLink {
                repo_dir: dir.clone(),
                path,
                outcome,
            });
        }
    }

    links.sort_by(|a, b| (&a.repo_dir, &a.path).cmp(&(&b.repo_dir, &b.path)));
    info!(count = links.len(), "Linked submodules");
    links
}

/// Make `<repo_dir>/<path>` a symbolic link to `../<path>`
fn link_one(repo_dir: &Path, path: &str) -> io::Result<LinkOutcome> {
    let relative = Path::new(path);
    if !relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Ok(LinkOutcome::Failed(format!("unsafe submodule path '{}'", path)));
    }

    let link = repo_dir.join(relative);
    let target = Path::new("..").join(relative);

    let outcome = match fs::symlink_metadata(&link) {
        Ok(meta) if meta.file_type().is_symlink() => {
            if fs::read_link(&link)? == target {
                return Ok(LinkOutcome::AlreadyLinked);
            }
            remove_symlink(&link)?;
            LinkOutcome::Replaced
        }
        Ok(meta) if meta.is_dir() => {
            fs::remove_dir_all(&link)?;
            LinkOutcome::Replaced
        }
        Ok(_) => {
            fs::remove_file(&link)?;
            LinkOutcome::Replaced
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            if let Some(parent) = link.parent() {
                fs::create_dir_all(parent)?;
            }
            LinkOutcome::Created
        }
        Err(e) => return Err(e),
    };

    create_symlink(&target, &link)?;
    Ok(outcome)
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

fn remove_symlink(link: &Path) -> io::Result<()> {
    // Directory symlinks on Windows need remove_dir
    fs::remove_file(link).or_else(|_| fs::remove_dir(link))
}
