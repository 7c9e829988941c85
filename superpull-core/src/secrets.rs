//! Hosting token lookup
//!
//! The token never lives in `config.toml`. It comes from `GITHUB_TOKEN` or,
//! failing that, from `~/.config/superpull/secrets.toml`:
//!
//! ```toml
//! [github]
//! token = "ghp_..."
//! ```
//!
//! On Unix the secrets file is refused unless only its owner can read it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Name of the environment variable holding the hosting token
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Contents of the secrets file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Secrets {
    pub github: GitHubSecrets,
}

/// `[github]` table of the secrets file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GitHubSecrets {
    pub token: Option<String>,
}

impl Secrets {
    /// Read the secrets file if there is one
    pub fn load() -> Result<Self> {
        match Self::default_secrets_path() {
            Some(path) if path.exists() => Self::load_from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Read a secrets file, refusing group or world readable files
    pub fn load_from_file(path: &Path) -> Result<Self> {
        check_owner_only(path)?;

        let raw = std::fs::read_to_string(path)?;
        let mut secrets: Secrets = toml::from_str(&raw).map_err(|e| {
            Error::Config(format!("Cannot parse {}: {}", path.display(), e))
        })?;

        secrets.github.token = secrets.github.token.map(|t| t.trim().to_string());
        Ok(secrets)
    }

    /// `~/.config/superpull/secrets.toml` on Unix
    pub fn default_secrets_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("superpull").join("secrets.toml"))
    }

    /// Resolve the token, preferring the environment over the file
    ///
    /// An empty or whitespace-only value counts as absent, which limits
    /// enumeration to public repositories.
    pub fn token(&self) -> Option<String> {
        Self::pick_token(std::env::var(TOKEN_ENV).ok(), self.github.token.as_deref())
    }

    fn pick_token(env: Option<String>, file: Option<&str>) -> Option<String> {
        if let Some(token) = env.map(|t| t.trim().to_string()) {
            if !token.is_empty() {
                debug!("Using token from {} environment variable", TOKEN_ENV);
                return Some(token);
            }
        }

        match file {
            Some(token) if !token.is_empty() => {
                debug!("Using token from secrets file");
                Some(token.to_string())
            }
            _ => None,
        }
    }
}

#[cfg(unix)]
fn check_owner_only(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = std::fs::metadata(path)?.permissions().mode() & 0o777;
    if mode & 0o077 != 0 {
        return Err(Error::Config(format!(
            "{} is accessible by other users (mode {:o}), run: chmod 600 {}",
            path.display(),
            mode,
            path.display()
        )));
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_owner_only(_path: &Path) -> Result<()> {
    Ok(())
}
