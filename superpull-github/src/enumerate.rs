//! Paginated repository enumeration
//!
//! An entity is an API path prefix such as `orgs/acme` or `users/octo`. Its
//! listing lives at `<entity>/repos`, a team's at `<entity>/teams/<team>/repos`.
//! Each listing is followed page by page through `rel="next"` links.

use std::collections::HashSet;
use std::time::Duration;

use superpull_core::GitHubConfig;
use tracing::{debug, info, warn};

use crate::{Enumeration, Error, FilterSpec, PageSource, RemoteRepository, Result};

/// Lists, deduplicates and filters the repositories of an entity
pub struct RepoEnumerator<S> {
    source: S,
    per_page: u32,
    max_retries: Option<u32>,
    retry_delay: Duration,
}

impl<S: PageSource> RepoEnumerator<S> {
    pub fn new(source: S, config: &GitHubConfig) -> Self {
        Self {
            source,
            per_page: config.per_page,
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
        }
    }

    /// Enumerate `entity`, or the union of `filter.teams` within it
    ///
    /// Repositories are deduplicated by name across listings with the first
    /// occurrence kept. A listing that answers 404 contributes nothing.
    pub async fn enumerate(&self, entity: &str, filter: &FilterSpec) -> Result<Enumeration> {
        let mut seen = HashSet::new();
        let mut unique = Vec::new();

        for address in self.addresses(entity, &filter.teams) {
            for repo in self.list(&address).await? {
                if seen.insert(repo.name.clone()) {
                    unique.push(repo);
                }
            }
        }

        let total = unique.len();
        let repositories: Vec<RemoteRepository> = filter
            .apply(unique)
            .into_iter()
            .map(RemoteRepository::without_git_suffix)
            .collect();

        info!("Got {} repos, {} after filtering", total, repositories.len());

        Ok(Enumeration {
            total,
            repositories,
        })
    }

    fn addresses(&self, entity: &str, teams: &[String]) -> Vec<String> {
        let entity = entity.trim_matches('/');
        if teams.is_empty() {
            return vec![format!("{}/repos?per_page={}", entity, self.per_page)];
        }

        teams
            .iter()
            .map(|team| {
                format!(
                    "{}/teams/{}/repos?per_page={}",
                    entity,
                    urlencoding::encode(team),
                    self.per_page
                )
            })
            .collect()
    }

    /// Follow one listing until there is no next page or a page is empty
    async fn list(&self, first: &str) -> Result<Vec<RemoteRepository>> {
        let mut repos = Vec::new();
        let mut address = Some(first.to_string());

        while let Some(current) = address {
            info!("Getting repos: '{}'", current);

            let (page, next) = match self.fetch(&current).await {
                Ok(page) => page,
                Err(Error::NotFound(_)) => {
                    info!("No repos at '{}'", first);
                    return Ok(Vec::new());
                }
                // A next link that cannot be requested ends the listing
                Err(Error::InvalidUrl(e)) if current != first => {
                    warn!("Ignoring malformed next link '{}': {}", current, e);
                    break;
                }
                Err(e) => return Err(e),
            };

            if page.is_empty() {
                break;
            }
            repos.extend(page);
            address = next;
        }

        Ok(repos)
    }

    /// Fetch one page, repeating the same address while errors are transient
    async fn fetch(&self, address: &str) -> Result<(Vec<RemoteRepository>, Option<String>)> {
        let mut attempts = 0u32;

        loop {
            match self.fetch_once(address).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_transient() && self.max_retries.map_or(true, |max| attempts < max) => {
                    attempts += 1;
                    warn!(address, attempts, error = %e, "Request failed, retrying");
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, address: &str) -> Result<(Vec<RemoteRepository>, Option<String>)> {
        let page = self.source.get_page(address).await?;

        match page.status {
            200..=299 => {}
            404 => return Err(Error::NotFound(address.to_string())),
            401 | 403 => {
                return Err(Error::Auth(format!(
                    "Get '{}', StatusCode: {}",
                    address, page.status
                )))
            }
            status => {
                debug!(address, status, body = %page.body, "Unexpected response");
                return Err(Error::Status {
                    status,
                    address: address.to_string(),
                });
            }
        }

        // `null` is an empty page
        let repos: Option<Vec<RemoteRepository>> = serde_json::from_str(&page.body)
            .map_err(|e| Error::Parse(format!("'{}': {}", address, e)))?;

        Ok((repos.unwrap_or_default(), page.next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Page;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// Scripted responses per address; unscripted addresses answer 404
    #[derive(Default)]
    struct FakeSource {
        responses: Mutex<HashMap<String, VecDeque<Page>>>,
        requests: Mutex<Vec<String>>,
    }

    impl FakeSource {
        fn respond(self, address: &str, page: Page) -> Self {
            self.responses
                .lock()
                .unwrap()
                .entry(address.to_string())
                .or_default()
                .push_back(page);
            self
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageSource for FakeSource {
        async fn get_page(&self, address: &str) -> Result<Page> {
            self.requests.lock().unwrap().push(address.to_string());
            if address.starts_with("http") {
                url::Url::parse(address)?;
            }
            let page = self
                .responses
                .lock()
                .unwrap()
                .get_mut(address)
                .and_then(VecDeque::pop_front);
            Ok(page.unwrap_or_else(|| status(404)))
        }
    }

    fn repos(names: &[(&str, u64)], next: Option<&str>) -> Page {
        let items: Vec<_> = names
            .iter()
            .map(|(name, size)| {
                json!({
                    "name": name,
                    "clone_url": format!("https://github.com/acme/{}.git", name),
                    "size": size,
                })
            })
            .collect();
        Page {
            status: 200,
            body: serde_json::to_string(&items).unwrap(),
            next: next.map(str::to_string),
        }
    }

    fn status(status: u16) -> Page {
        Page {
            status,
            body: r#"{"message": "scripted"}"#.to_string(),
            next: None,
        }
    }

    fn enumerator(source: FakeSource, max_retries: Option<u32>) -> RepoEnumerator<FakeSource> {
        let config = GitHubConfig {
            per_page: 2,
            max_retries,
            retry_delay: Duration::ZERO,
            ..GitHubConfig::default()
        };
        RepoEnumerator::new(source, &config)
    }

    #[tokio::test]
    async fn test_follows_next_links() {
        let source = FakeSource::default()
            .respond(
                "orgs/acme/repos?per_page=2",
                repos(&[("a", 1), ("b", 1)], Some("https://api.test/p2")),
            )
            .respond(
                "https://api.test/p2",
                repos(&[("c", 1), ("d", 1)], Some("https://api.test/p3")),
            )
            .respond("https://api.test/p3", repos(&[("e", 1), ("f", 1)], None));
        let enumerator = enumerator(source, None);

        let found = enumerator
            .enumerate("orgs/acme", &FilterSpec::default())
            .await
            .unwrap();

        assert_eq!(found.total, 6);
        assert_eq!(found.repositories.len(), 6);
        assert_eq!(enumerator.source.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_page_ends_listing() {
        let source = FakeSource::default()
            .respond(
                "orgs/acme/repos?per_page=2",
                repos(&[("a", 1), ("b", 1)], Some("https://api.test/p2")),
            )
            .respond("https://api.test/p2", repos(&[], Some("https://api.test/p3")));
        let enumerator = enumerator(source, None);

        let found = enumerator
            .enumerate("orgs/acme", &FilterSpec::default())
            .await
            .unwrap();

        assert_eq!(found.total, 2);
        assert_eq!(enumerator.source.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_not_found_is_empty() {
        let enumerator = enumerator(FakeSource::default(), None);

        let found = enumerator
            .enumerate("/orgs/ghost-org/", &FilterSpec::default())
            .await
            .unwrap();

        assert_eq!(found.total, 0);
        assert!(found.repositories.is_empty());
        assert_eq!(
            enumerator.source.requests(),
            vec!["orgs/ghost-org/repos?per_page=2"]
        );
    }

    #[tokio::test]
    async fn test_malformed_body_retries_same_page() {
        let address = "users/octo/repos?per_page=2";
        let garbage = Page {
            status: 200,
            body: "[{\"name\": ".to_string(),
            next: None,
        };
        let source = FakeSource::default()
            .respond(address, garbage)
            .respond(address, repos(&[("a", 1)], None));
        let enumerator = enumerator(source, None);

        let found = enumerator
            .enumerate("users/octo", &FilterSpec::default())
            .await
            .unwrap();

        assert_eq!(found.total, 1);
        assert_eq!(enumerator.source.requests(), vec![address, address]);
    }

    #[tokio::test]
    async fn test_server_error_retried() {
        let address = "orgs/acme/repos?per_page=2";
        let source = FakeSource::default()
            .respond(address, status(502))
            .respond(address, status(500))
            .respond(address, repos(&[("a", 1)], None));
        let enumerator = enumerator(source, None);

        let found = enumerator
            .enumerate("orgs/acme", &FilterSpec::default())
            .await
            .unwrap();

        assert_eq!(found.total, 1);
        assert_eq!(enumerator.source.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let address = "orgs/acme/repos?per_page=2";
        let source = FakeSource::default()
            .respond(address, status(503))
            .respond(address, status(503))
            .respond(address, status(503));
        let enumerator = enumerator(source, Some(2));

        let result = enumerator
            .enumerate("orgs/acme", &FilterSpec::default())
            .await;

        assert!(matches!(result, Err(Error::Status { status: 503, .. })));
        assert_eq!(enumerator.source.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_unauthorized_is_fatal() {
        let source = FakeSource::default().respond("orgs/acme/repos?per_page=2", status(401));
        let enumerator = enumerator(source, None);

        let result = enumerator
            .enumerate("orgs/acme", &FilterSpec::default())
            .await;

        assert!(matches!(result, Err(Error::Auth(_))));
        assert_eq!(enumerator.source.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_other_client_error_is_fatal() {
        let source = FakeSource::default().respond("orgs/acme/repos?per_page=2", status(422));
        let enumerator = enumerator(source, None);

        let result = enumerator
            .enumerate("orgs/acme", &FilterSpec::default())
            .await;

        assert!(matches!(result, Err(Error::Status { status: 422, .. })));
    }

    #[tokio::test]
    async fn test_teams_union_first_wins() {
        let source = FakeSource::default()
            .respond(
                "orgs/acme/teams/web/repos?per_page=2",
                repos(&[("shared", 10), ("site", 1)], None),
            )
            .respond(
                "orgs/acme/teams/ops/repos?per_page=2",
                repos(&[("shared", 99), ("infra", 1)], None),
            );
        let enumerator = enumerator(source, None);
        let filter = FilterSpec::default().teams(vec![
            "web".to_string(),
            "ops".to_string(),
            "gone".to_string(),
        ]);

        let found = enumerator.enumerate("orgs/acme", &filter).await.unwrap();

        let names: Vec<&str> = found.repositories.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["shared", "site", "infra"]);
        assert_eq!(found.repositories[0].size_kb, 10);
        assert_eq!(enumerator.source.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_filters_and_suffix() {
        let source = FakeSource::default().respond(
            "orgs/acme/repos?per_page=2",
            repos(&[("web-a", 10), ("web-b", 50), ("big", 200)], None),
        );
        let enumerator = enumerator(source, None);
        let filter = FilterSpec::with_patterns(&["^web-"], &["-b$"])
            .unwrap()
            .max_size_kb(Some(100));

        let found = enumerator.enumerate("orgs/acme", &filter).await.unwrap();

        assert_eq!(found.total, 3);
        assert_eq!(found.clone_urls(), vec!["https://github.com/acme/web-a"]);
    }

    #[tokio::test]
    async fn test_malformed_next_link_keeps_fetched_pages() {
        let source = FakeSource::default().respond(
            "orgs/acme/repos?per_page=2",
            repos(&[("a", 1), ("b", 1)], Some("http://[bad")),
        );
        let enumerator = enumerator(source, None);

        let found = enumerator
            .enumerate("orgs/acme", &FilterSpec::default())
            .await
            .unwrap();

        assert_eq!(found.total, 2);
        assert_eq!(enumerator.source.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_team_names_are_encoded() {
        let source = FakeSource::default().respond(
            "orgs/acme/teams/web%2Fops%20team%3F/repos?per_page=2",
            repos(&[("site", 1)], None),
        );
        let enumerator = enumerator(source, None);
        let filter = FilterSpec::default().teams(vec!["web/ops team?".to_string()]);

        let found = enumerator.enumerate("orgs/acme", &filter).await.unwrap();

        assert_eq!(found.total, 1);
        assert_eq!(
            enumerator.source.requests(),
            vec!["orgs/acme/teams/web%2Fops%20team%3F/repos?per_page=2"]
        );
    }

    #[tokio::test]
    async fn test_null_body_is_empty() {
        let page = Page {
            status: 200,
            body: "null".to_string(),
            next: Some("https://api.test/p2".to_string()),
        };
        let source = FakeSource::default().respond("orgs/acme/repos?per_page=2", page);
        let enumerator = enumerator(source, None);

        let found = enumerator
            .enumerate("orgs/acme", &FilterSpec::default())
            .await
            .unwrap();

        assert_eq!(found.total, 0);
        assert_eq!(enumerator.source.requests().len(), 1);
    }
}
