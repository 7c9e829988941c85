//! Superpull GitHub - remote repository enumeration
//!
//! This crate lists the repositories of an organization, user or team
//! through the paginated REST listing endpoints, then deduplicates and
//! filters them for the clone workflow.

mod client;
mod enumerate;
mod error;
mod filter;
mod pagination;
mod types;

pub use client::{Credential, GitHubClient, Page, PageSource};
pub use enumerate::RepoEnumerator;
pub use error::{Error, Result};
pub use filter::FilterSpec;
pub use pagination::next_link;
pub use types::{Enumeration, RemoteRepository};
