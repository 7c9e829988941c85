//! Repository records returned by listing endpoints

use serde::Deserialize;

/// One repository entry of a listing page
///
/// Only the fields needed for cloning are kept; everything else in the
/// response is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteRepository {
    /// Repository name, unique within one enumeration
    pub name: String,
    /// HTTPS clone URL
    pub clone_url: String,
    /// Repository size in kilobytes
    #[serde(rename = "size", default)]
    pub size_kb: u64,
}

impl RemoteRepository {
    /// Same repository with any trailing `.git` removed from the clone URL
    pub fn without_git_suffix(mut self) -> Self {
        if let Some(stripped) = self.clone_url.strip_suffix(".git") {
            self.clone_url = stripped.to_string();
        }
        self
    }
}

/// Repositories found for one entity
#[derive(Debug, Clone, Default)]
pub struct Enumeration {
    /// Distinct repositories seen before filtering
    pub total: usize,
    /// Repositories that passed the filters, clone URLs without `.git`
    pub repositories: Vec<RemoteRepository>,
}

impl Enumeration {
    /// Clone URLs of the surviving repositories
    pub fn clone_urls(&self) -> Vec<String> {
        self.repositories.iter().map(|r| r.clone_url.clone()).collect()
    }
}
