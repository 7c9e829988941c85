//! Discovery of existing git working copies below a root folder

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Find the git working copies below `root`
///
/// Looks at the immediate subdirectories of `root`, or at every descendant
/// directory when `recursive` is set, and keeps those that contain a `.git`
/// entry (a directory, or a file for worktrees and submodules). Symbolic
/// links are never followed. The result is sorted lexicographically.
pub fn scan(root: impl AsRef<Path>, recursive: bool) -> Result<Vec<PathBuf>> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(Error::DirectoryNotFound(root.to_path_buf()));
    }

    let mut directories = Vec::new();
    collect_directories(root, recursive, true, &mut directories)?;

    let mut repos: Vec<PathBuf> = directories
        .into_iter()
        .filter(|dir| dir.join(".git").exists())
        .collect();
    repos.sort();

    Ok(repos)
}

fn collect_directories(
    dir: &Path,
    recursive: bool,
    is_root: bool,
    out: &mut Vec<PathBuf>,
) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if is_root => return Err(Error::Io(e)),
        // Unreadable subtrees are skipped; only the root is mandatory.
        Err(e) => {
            tracing::warn!("Skipping unreadable directory {:?}: {}", dir, e);
            return Ok(());
        }
    };

    for entry in entries {
        let Some(entry) = directory_entry(dir, entry) else {
            continue;
        };

        let path = entry.path();
        out.push(path.clone());

        if recursive && entry.file_name() != ".git" {
            collect_directories(&path, recursive, false, out)?;
        }
    }

    Ok(())
}

/// The entry if it is a directory; entries that cannot be inspected are skipped
fn directory_entry(dir: &Path, entry: io::Result<fs::DirEntry>) -> Option<fs::DirEntry> {
    let entry = match entry {
        Ok(entry) => entry,
        Err(e) => {
            tracing::warn!("Skipping unreadable entry in {:?}: {}", dir, e);
            return None;
        }
    };

    match entry.file_type() {
        Ok(file_type) if file_type.is_dir() => Some(entry),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("Skipping {:?}: {}", entry.path(), e);
            None
        }
    }
}
