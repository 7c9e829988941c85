//! Clone command - clone every repository of an entity

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use superpull_core::secrets::TOKEN_ENV;
use superpull_core::{clone_all, CancellationToken, CloneOptions, Config, Secrets};
use superpull_github::{Credential, FilterSpec, GitHubClient, RepoEnumerator};
use tracing::{info, warn};

use super::print_report;

/// Clone the repositories of an organization, user or team
#[derive(Args, Debug)]
pub struct CloneArgs {
    /// API path of the owner, e.g. `orgs/acme` or `users/octo`
    entity: String,

    /// Folder the clones are created in
    #[arg(short, long, default_value = ".")]
    directory: PathBuf,

    /// Only clone repositories of this team (repeatable)
    #[arg(long = "team", value_name = "TEAM")]
    teams: Vec<String>,

    /// Keep repositories whose name matches this regex (repeatable)
    #[arg(long, value_name = "REGEX")]
    include: Vec<String>,

    /// Drop repositories whose name matches this regex (repeatable)
    #[arg(long, value_name = "REGEX")]
    exclude: Vec<String>,

    /// Skip repositories larger than this many kilobytes
    #[arg(long, value_name = "KB")]
    max_size: Option<u64>,

    /// Replace submodules of the new clones with links to sibling clones
    #[arg(long)]
    link_submodules: bool,

    /// Show what would be cloned without cloning
    #[arg(long)]
    dry_run: bool,
}

impl CloneArgs {
    /// Execute the clone command
    pub async fn execute(&self, config: &Config, cancel: CancellationToken) -> anyhow::Result<bool> {
        let filter = FilterSpec::with_patterns(&self.include[..], &self.exclude[..])
            .context("Invalid name filter")?
            .max_size_kb(self.max_size)
            .teams(self.teams.clone());

        let secrets = Secrets::load()?;
        let credential = Credential::from_token(secrets.token(), config.github.auth_scheme);
        if credential == Credential::None {
            warn!("{} not set, only public repositories are visible", TOKEN_ENV);
        }
        let token = credential.token().map(str::to_string);

        let client = GitHubClient::new(&config.github, credential)?;
        info!("Listing '{}' at {}", self.entity, client.base());
        let enumerator = RepoEnumerator::new(client, &config.github);

        let found = tokio::select! {
            found = enumerator.enumerate(&self.entity, &filter) => found?,
            _ = cancel.cancelled() => {
                warn!("Cancelled while listing repositories");
                return Ok(false);
            }
        };

        let options = CloneOptions {
            target_dir: self.directory.clone(),
            token,
            link_submodules: self.link_submodules,
            dry_run: self.dry_run,
        };
        let report = clone_all(&found.clone_urls(), &options, &config.pool, cancel).await?;

        if !report.success() {
            println!("No repositories to clone for '{}'", self.entity);
            return Ok(false);
        }

        if self.dry_run {
            println!("Would clone {} of {} repositories", report.planned.len(), found.total);
            return Ok(true);
        }

        print_report(&report);
        Ok(true)
    }
}
