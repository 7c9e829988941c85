//! Configuration management for Superpull
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (SUPERPULL_*)
//! 3. Config file (~/.config/superpull/config.toml)
//! 4. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Subprocess pool configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of git processes running at once
    pub throttle: usize,

    /// Time after pool start at which remaining processes are killed
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Cadence of the "still running" progress report
    #[serde(with = "humantime_serde")]
    pub report_interval: Duration,

    /// Path to the git executable
    pub git_path: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            throttle: 30,
            timeout: Duration::from_secs(600),
            report_interval: Duration::from_secs(10),
            git_path: "git".to_string(),
        }
    }
}

/// How the token is presented to the hosting API
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthScheme {
    /// HTTP Basic with the token as the username
    #[default]
    Basic,
    /// `Authorization: Bearer <token>`
    Bearer,
}

impl std::str::FromStr for AuthScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "bearer" => Ok(Self::Bearer),
            other => Err(Error::Config(format!(
                "Unknown auth scheme '{}'. Expected 'basic' or 'bearer'",
                other
            ))),
        }
    }
}

/// Hosting API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// Base address listing endpoints are resolved against
    pub api_url: String,

    /// Page size requested from listing endpoints
    pub per_page: u32,

    /// Authorization header style used when a token is present
    pub auth_scheme: AuthScheme,

    /// User-Agent header sent with every request
    pub user_agent: String,

    /// Retries of a single page before giving up (None = retry forever)
    pub max_retries: Option<u32>,

    /// Pause between retries of the same page
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            per_page: 100,
            auth_scheme: AuthScheme::Basic,
            user_agent: format!("superpull/{}", env!("CARGO_PKG_VERSION")),
            max_retries: None,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Subprocess pool configuration
    pub pool: PoolConfig,

    /// Hosting API configuration
    pub github: GitHubConfig,
}

/// Values given on the command line, each overriding config and env
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub throttle: Option<usize>,
    pub timeout: Option<Duration>,
    pub api_url: Option<String>,
    pub auth_scheme: Option<AuthScheme>,
}

impl Config {
    /// Read the config file, or use defaults when there is none
    pub fn load() -> Result<Self> {
        match Self::default_config_path() {
            Some(path) if path.exists() => Self::load_from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Read a specific config file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("Cannot parse {}: {}", path.display(), e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/superpull/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("superpull").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - SUPERPULL_THROTTLE: Maximum concurrent git processes
    /// - SUPERPULL_TIMEOUT: Pool timeout (e.g. "90s", "5m")
    /// - SUPERPULL_GIT_PATH: Path to git executable
    /// - SUPERPULL_API_URL: Hosting API base address
    /// - SUPERPULL_AUTH_SCHEME: "basic" or "bearer"
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(throttle) = std::env::var("SUPERPULL_THROTTLE") {
            self.pool.throttle = throttle.trim().parse().map_err(|_| {
                Error::Config(format!("SUPERPULL_THROTTLE is not a number: {}", throttle))
            })?;
        }

        if let Ok(timeout) = std::env::var("SUPERPULL_TIMEOUT") {
            self.pool.timeout = humantime_serde::re::humantime::parse_duration(timeout.trim())
                .map_err(|e| Error::Config(format!("SUPERPULL_TIMEOUT: {}", e)))?;
        }

        if let Ok(git_path) = std::env::var("SUPERPULL_GIT_PATH") {
            self.pool.git_path = git_path;
        }

        if let Ok(api_url) = std::env::var("SUPERPULL_API_URL") {
            self.github.api_url = api_url;
        }

        if let Ok(scheme) = std::env::var("SUPERPULL_AUTH_SCHEME") {
            self.github.auth_scheme = scheme.parse()?;
        }

        Ok(self)
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(mut self, overrides: CliOverrides) -> Self {
        if let Some(throttle) = overrides.throttle {
            self.pool.throttle = throttle;
        }

        if let Some(timeout) = overrides.timeout {
            self.pool.timeout = timeout;
        }

        if let Some(api_url) = overrides.api_url {
            self.github.api_url = api_url;
        }

        if let Some(scheme) = overrides.auth_scheme {
            self.github.auth_scheme = scheme;
        }

        self
    }

    /// Reject values the pool and enumerator cannot work with
    pub fn validate(self) -> Result<Self> {
        if self.pool.throttle == 0 {
            return Err(Error::Config("throttle must be at least 1".to_string()));
        }
        if self.pool.report_interval.is_zero() {
            return Err(Error::Config(
                "report_interval must be greater than zero".to_string(),
            ));
        }
        if self.github.per_page == 0 {
            return Err(Error::Config("per_page must be at least 1".to_string()));
        }
        Ok(self)
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(overrides: CliOverrides) -> Result<Self> {
        Self::load()?
            .with_env_overrides()?
            .with_cli_overrides(overrides)
            .validate()
    }
}
