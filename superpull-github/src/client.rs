//! HTTP access to the hosting API

use async_trait::async_trait;
use reqwest::header::LINK;
use superpull_core::{AuthScheme, GitHubConfig};
use tracing::{debug, warn};
use url::Url;

use crate::{next_link, Result};

/// How requests authenticate, chosen once at startup
#[derive(Clone, Default, PartialEq, Eq)]
pub enum Credential {
    /// No Authorization header; only public repositories are visible
    #[default]
    None,
    /// HTTP Basic with the token as the username and no password
    Basic(String),
    /// `Authorization: Bearer <token>`
    Bearer(String),
}

impl Credential {
    /// Build the credential for an optional token
    ///
    /// An empty token means no credential.
    pub fn from_token(token: Option<String>, scheme: AuthScheme) -> Self {
        match token.filter(|t| !t.is_empty()) {
            None => Self::None,
            Some(token) => match scheme {
                AuthScheme::Basic => Self::Basic(token),
                AuthScheme::Bearer => Self::Bearer(token),
            },
        }
    }

    /// The raw token, if any
    pub fn token(&self) -> Option<&str> {
        match self {
            Self::None => None,
            Self::Basic(token) | Self::Bearer(token) => Some(token),
        }
    }

    fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Self::None => request,
            Self::Basic(token) => request.basic_auth(token, None::<&str>),
            Self::Bearer(token) => request.bearer_auth(token),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Basic(_) => write!(f, "Basic(<redacted>)"),
            Self::Bearer(_) => write!(f, "Bearer(<redacted>)"),
        }
    }
}

/// One raw listing response
#[derive(Debug, Clone)]
pub struct Page {
    /// HTTP status code
    pub status: u16,
    /// Response body, unparsed
    pub body: String,
    /// Address of the next page, from the `Link` header
    pub next: Option<String>,
}

/// Anything that can fetch a listing page by address
///
/// Addresses are either relative to the API base (`orgs/acme/repos?...`) or
/// absolute (`next` links).
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn get_page(&self, address: &str) -> Result<Page>;
}

/// Hosting API client backed by reqwest
pub struct GitHubClient {
    http: reqwest::Client,
    base: Url,
    credential: Credential,
}

impl GitHubClient {
    /// Create a client for the configured base address
    pub fn new(config: &GitHubConfig, credential: Credential) -> Result<Self> {
        let mut api_url = config.api_url.trim().to_string();
        if !api_url.ends_with('/') {
            api_url.push('/');
        }
        let base = Url::parse(&api_url)?;

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;

        debug!(base = %base, credential = ?credential, "Created API client");

        Ok(Self {
            http,
            base,
            credential,
        })
    }

    /// Base address relative listing paths are resolved against
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Turn a listing address into a full URL
    pub fn resolve(&self, address: &str) -> Result<Url> {
        match Url::parse(address) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                Ok(self.base.join(address.trim_start_matches('/'))?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Drop a `next` link that does not resolve, ending pagination
    fn checked_next(&self, next: Option<String>) -> Option<String> {
        let next = next?;
        match self.resolve(&next) {
            Ok(_) => Some(next),
            Err(e) => {
                warn!("Ignoring malformed next link '{}': {}", next, e);
                None
            }
        }
    }
}

#[async_trait]
impl PageSource for GitHubClient {
    async fn get_page(&self, address: &str) -> Result<Page> {
        let url = self.resolve(address)?;
        let response = self.credential.apply(self.http.get(url)).send().await?;

        let status = response.status().as_u16();
        let next = self.checked_next(next_link(
            response
                .headers()
                .get_all(LINK)
                .iter()
                .filter_map(|value| value.to_str().ok()),
        ));
        let body = response.text().await?;

        Ok(Page { status, body, next })
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("base", &self.base.as_str())
            .field("credential", &self.credential)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::AUTHORIZATION;

    fn client(api_url: &str, credential: Credential) -> GitHubClient {
        let config = GitHubConfig {
            api_url: api_url.to_string(),
            ..GitHubConfig::default()
        };
        GitHubClient::new(&config, credential).unwrap()
    }

    #[test]
    fn test_resolve_relative_keeps_base_path() {
        let client = client("https://ghe.example.com/api/v3", Credential::None);
        assert_eq!(
            client.resolve("orgs/acme/repos?per_page=100").unwrap().as_str(),
            "https://ghe.example.com/api/v3/orgs/acme/repos?per_page=100"
        );
        assert_eq!(
            client.resolve("/users/octo/repos").unwrap().as_str(),
            "https://ghe.example.com/api/v3/users/octo/repos"
        );
    }

    #[test]
    fn test_resolve_absolute_verbatim() {
        let client = client("https://api.github.com", Credential::None);
        let next = "https://api.github.com/organizations/42/repos?per_page=100&page=2";
        assert_eq!(client.resolve(next).unwrap().as_str(), next);
    }

    #[test]
    fn test_malformed_next_link_dropped() {
        let client = client("https://api.github.com", Credential::None);
        assert_eq!(client.checked_next(Some("http://[bad".to_string())), None);
        assert_eq!(client.checked_next(None), None);
        assert_eq!(
            client.checked_next(Some("https://api.github.com/p2".to_string())).as_deref(),
            Some("https://api.github.com/p2")
        );
    }

    #[test]
    fn test_invalid_base_rejected() {
        let config = GitHubConfig {
            api_url: "not a url".to_string(),
            ..GitHubConfig::default()
        };
        assert!(GitHubClient::new(&config, Credential::None).is_err());
    }

    #[test]
    fn test_credential_from_token() {
        assert_eq!(
            Credential::from_token(Some("tok".to_string()), AuthScheme::Bearer),
            Credential::Bearer("tok".to_string())
        );
        assert_eq!(
            Credential::from_token(Some(String::new()), AuthScheme::Basic),
            Credential::None
        );
        assert_eq!(Credential::from_token(None, AuthScheme::Basic), Credential::None);
    }

    #[test]
    fn test_debug_redacts_token() {
        let shown = format!("{:?}", Credential::Basic("ghp_secret".to_string()));
        assert!(!shown.contains("ghp_secret"));
    }

    #[test]
    fn test_authorization_headers() {
        let http = reqwest::Client::new();
        let header = |credential: Credential| {
            credential
                .apply(http.get("https://api.github.com/orgs/acme/repos"))
                .build()
                .unwrap()
                .headers()
                .get(AUTHORIZATION)
                .map(|v| v.to_str().unwrap().to_string())
        };

        assert_eq!(header(Credential::None), None);
        assert_eq!(
            header(Credential::Basic("tok".to_string())).as_deref(),
            Some("Basic dG9rOg==")
        );
        assert_eq!(
            header(Credential::Bearer("tok".to_string())).as_deref(),
            Some("Bearer tok")
        );
    }
}
