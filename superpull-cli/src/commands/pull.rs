//! Pull command - refresh existing working copies

use std::path::PathBuf;

use clap::Args;
use superpull_core::{pull_all, CancellationToken, Config};

use super::print_report;

/// Run `git pull -r` in every working copy below a folder
#[derive(Args, Debug)]
pub struct PullArgs {
    /// Also look for working copies below the immediate subfolders
    #[arg(short, long)]
    recursive: bool,

    /// Folder holding the working copies
    #[arg(default_value = ".")]
    folder: PathBuf,
}

impl PullArgs {
    /// Execute the pull command
    pub async fn execute(&self, config: &Config, cancel: CancellationToken) -> anyhow::Result<bool> {
        let report = pull_all(&self.folder, self.recursive, &config.pool, cancel).await?;

        if !report.success() {
            println!("No git repositories found in {}", self.folder.display());
            return Ok(false);
        }

        print_report(&report);
        Ok(true)
    }
}
