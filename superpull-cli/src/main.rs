//! Superpull CLI - bulk pull and clone of git repositories
//!
//! Refreshes a tree of existing working copies, or clones every repository
//! of an organization, user or team.

mod commands;
mod shutdown;

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use superpull_core::secrets::TOKEN_ENV;
use superpull_core::{AuthScheme, CancellationToken, CliOverrides, Config, Secrets};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{CloneArgs, PullArgs};

/// Superpull: keep many git repositories in sync at once
#[derive(Parser, Debug)]
#[command(name = "superpull")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Maximum number of git processes at once (overrides config and env)
    #[arg(short, long, global = true)]
    throttle: Option<usize>,

    /// Seconds after which remaining git processes are killed
    #[arg(long, global = true, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Hosting API base address (overrides config and env)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Send the token as a Bearer token instead of Basic credentials
    #[arg(long, global = true)]
    bearer: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Pull every working copy below a folder
    Pull(PullArgs),

    /// Clone every repository of an organization, user or team
    #[command(visible_alias = "ghclone")]
    Clone(CloneArgs),

    /// Show current configuration
    Config,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            throttle: self.throttle,
            timeout: self.timeout.map(Duration::from_secs),
            api_url: self.api_url.clone(),
            auth_scheme: self.bearer.then_some(AuthScheme::Bearer),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    // Load configuration with overrides
    let config = Config::load_with_overrides(cli.overrides())?;

    tracing::debug!(
        throttle = config.pool.throttle,
        timeout = ?config.pool.timeout,
        api_url = %config.github.api_url,
        "Configuration loaded"
    );

    match cli.command {
        Some(Commands::Version) => {
            println!("superpull {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Pull(args)) => {
            let cancel = CancellationToken::new();
            shutdown::cancel_on_ctrl_c(cancel.clone());
            return args.execute(&config, cancel).await;
        }
        Some(Commands::Clone(args)) => {
            let cancel = CancellationToken::new();
            shutdown::cancel_on_ctrl_c(cancel.clone());
            return args.execute(&config, cancel).await;
        }
        Some(Commands::Config) => show_config(&config)?,
        None => {
            println!("Superpull - bulk pull and clone of git repositories");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(true)
}

fn show_config(config: &Config) -> anyhow::Result<()> {
    println!("Superpull Configuration");
    println!("=======================");
    println!();
    println!("Pool Settings:");
    println!("  throttle: {}", config.pool.throttle);
    println!("  timeout: {:?}", config.pool.timeout);
    println!("  report_interval: {:?}", config.pool.report_interval);
    println!("  git_path: {}", config.pool.git_path);
    println!();
    println!("API Settings:");
    println!("  api_url: {}", config.github.api_url);
    println!("  per_page: {}", config.github.per_page);
    println!("  auth_scheme: {:?}", config.github.auth_scheme);
    println!("  user_agent: {}", config.github.user_agent);
    match config.github.max_retries {
        Some(max) => println!("  max_retries: {}", max),
        None => println!("  max_retries: (unlimited)"),
    }
    println!("  retry_delay: {:?}", config.github.retry_delay);
    println!();

    if let Some(path) = Config::default_config_path() {
        println!("Config file: {}", path.display());
        if path.exists() {
            println!("  (exists)");
        } else {
            println!("  (not found - using defaults)");
        }
    }

    let secrets = Secrets::load()?;
    if let Some(path) = Secrets::default_secrets_path() {
        println!("Secrets file: {}", path.display());
        if !path.exists() {
            println!("  (not found)");
        }
    }
    match secrets.token() {
        Some(_) => println!("Token: configured"),
        None => println!("Token: not set (set {} for private repositories)", TOKEN_ENV),
    }

    Ok(())
}
