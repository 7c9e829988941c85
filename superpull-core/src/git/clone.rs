//! Pull and clone task construction

use std::path::Path;

use crate::pool::SyncTask;
use crate::{Error, Result};

/// Task running `git pull -r` inside an existing working copy
pub fn pull_task(git: &str, repo_dir: &Path) -> SyncTask {
    let name = repo_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| repo_dir.display().to_string());

    SyncTask::new(name.clone(), git)
        .args(["pull", "-r"])
        .current_dir(repo_dir)
        .describe(format!("Pulling {}...", name))
}

/// Task running `git clone -- <url> <target>`
///
/// `name` is the identifier used in progress reports. The launch line shows
/// `display_url`, which must not carry the credential embedded in `url`.
pub fn clone_task(git: &str, name: &str, display_url: &str, url: &str, target: &Path) -> SyncTask {
    SyncTask::new(name, git)
        .describe(format!("Cloning: '{}' -> '{}'", display_url, target.display()))
        .args(["clone", "--"])
        .arg(url)
        .arg(target.to_string_lossy())
}

/// Embed `token` as the user part of a clone URL
///
/// `https://host/org/repo` becomes `https://<token>@host/org/repo`. Without a
/// token the URL is returned unchanged.
pub fn with_credentials(url: &str, token: Option<&str>) -> Result<String> {
    let Some(token) = token else {
        return Ok(url.to_string());
    };

    let mut parsed = url::Url::parse(url).map_err(|_| Error::InvalidUrl(url.to_string()))?;
    if !url.contains("://") || parsed.cannot_be_a_base() {
        return Err(Error::InvalidUrl(url.to_string()));
    }

    parsed
        .set_username(token)
        .map_err(|_| Error::InvalidUrl(url.to_string()))?;

    Ok(parsed.to_string())
}
