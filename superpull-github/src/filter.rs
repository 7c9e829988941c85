//! Size and name filters applied after enumeration

use regex::Regex;

use crate::{RemoteRepository, Result};

/// Caller-supplied selection of repositories
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    /// A repository is kept if any of these match its name (empty = all)
    pub include: Vec<Regex>,
    /// A repository is dropped if any of these match its name
    pub exclude: Vec<Regex>,
    /// Largest repository size kept, in kilobytes
    pub max_size_kb: Option<u64>,
    /// Enumerate these teams of the entity instead of the entity itself
    pub teams: Vec<String>,
}

impl FilterSpec {
    /// Compile include and exclude patterns
    pub fn with_patterns<S: AsRef<str>>(include: &[S], exclude: &[S]) -> Result<Self> {
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
            ..Self::default()
        })
    }

    pub fn max_size_kb(mut self, max: Option<u64>) -> Self {
        self.max_size_kb = max;
        self
    }

    pub fn teams(mut self, teams: Vec<String>) -> Self {
        self.teams = teams;
        self
    }

    /// Size ceiling, then include patterns, then exclude patterns
    pub fn matches(&self, repo: &RemoteRepository) -> bool {
        if let Some(max) = self.max_size_kb {
            if repo.size_kb > max {
                return false;
            }
        }

        if !self.include.is_empty() && !self.include.iter().any(|re| re.is_match(&repo.name)) {
            return false;
        }

        !self.exclude.iter().any(|re| re.is_match(&repo.name))
    }

    /// Keep the repositories that match, preserving order
    pub fn apply(&self, repos: Vec<RemoteRepository>) -> Vec<RemoteRepository> {
        repos.into_iter().filter(|repo| self.matches(repo)).collect()
    }
}

fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(p.as_ref()).map_err(Into::into))
        .collect()
}
