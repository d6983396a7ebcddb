//! GitHub REST adapter
//!
//! Implements [`TrackedClient`] against the GitHub REST v3 API.

use super::{CreateItemRequest, ItemComment, TrackedClient, TrackedItem, UpdateItemRequest};
use crate::Result;
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

/// Per-request timeout for single item fetches
const GET_TIMEOUT: Duration = Duration::from_secs(10);
/// Per-request timeout for create/update operations
const WRITE_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Serialize)]
struct CreateCommentRequest {
    body: String,
}

#[derive(Debug, Clone, Serialize)]
struct AddLabelsRequest {
    labels: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
struct CreateLabelRequest {
    name: String,
    color: String,
}

/// GitHub API client
pub struct GitHubClient {
    client: Client,
    rest_base_url: String,
    auth_token: Option<String>,
}

impl GitHubClient {
    /// Create a client for api.github.com. The token is taken from the
    /// GITHUB_TOKEN environment variable when present.
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self> {
        Self::with_base_url("https://api.github.com")
    }

    /// Create a client against a specific API base URL (GitHub
    /// Enterprise instances use `https://<host>/api/v3`).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .default_headers({
                let mut headers = header::HeaderMap::new();
                headers.insert(
                    header::USER_AGENT,
                    header::HeaderValue::from_static("casebridge/0.3"),
                );
                headers.insert(
                    header::ACCEPT,
                    header::HeaderValue::from_static("application/vnd.github.v3+json"),
                );
                headers
            })
            .build()?;

        let auth_token = std::env::var("GITHUB_TOKEN").ok();

        Ok(Self {
            client,
            rest_base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_token,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth_token.is_some()
    }

    /// Split "owner/name" into its parts
    fn parse_repo(repo: &str) -> Result<(&str, &str)> {
        repo.split_once('/')
            .filter(|(owner, name)| !owner.is_empty() && !name.is_empty())
            .ok_or_else(|| {
                crate::BridgeError::Config(format!("Invalid repo (want owner/name): {}", repo))
            })
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth_token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn error_from(response: reqwest::Response, context: &str) -> crate::BridgeError {
        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED => {
                crate::BridgeError::Integration("GitHub authentication failed".to_string())
            }
            StatusCode::FORBIDDEN => crate::BridgeError::Integration(
                "GitHub API forbidden (rate limit?)".to_string(),
            ),
            _ => {
                let error_body = response.text().await.unwrap_or_default();
                crate::BridgeError::Integration(format!(
                    "{}: HTTP {}: {}",
                    context, status, error_body
                ))
            }
        }
    }
}

#[async_trait]
impl TrackedClient for GitHubClient {
    async fn get_issue(&self, repo: &str, number: u64) -> Result<TrackedItem> {
        let (owner, name) = Self::parse_repo(repo)?;
        let url = format!(
            "{}/repos/{}/{}/issues/{}",
            self.rest_base_url, owner, name, number
        );

        debug!(repo = %repo, number = %number, "Fetching GitHub issue");

        let response = self
            .authed(self.client.get(&url))
            .timeout(GET_TIMEOUT)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            StatusCode::NOT_FOUND => Err(crate::BridgeError::Integration(format!(
                "Issue not found: {}#{}",
                repo, number
            ))),
            _ => Err(Self::error_from(response, "GitHub get issue failed").await),
        }
    }

    async fn create_issue(&self, repo: &str, request: CreateItemRequest) -> Result<TrackedItem> {
        let (owner, name) = Self::parse_repo(repo)?;
        let url = format!("{}/repos/{}/{}/issues", self.rest_base_url, owner, name);

        info!(repo = %repo, title = %request.title, "Creating GitHub issue");

        let response = self
            .authed(self.client.post(&url).json(&request))
            .timeout(WRITE_TIMEOUT)
            .send()
            .await?;

        match response.status() {
            StatusCode::CREATED => {
                let item: TrackedItem = response.json().await?;
                info!(number = item.number, "GitHub issue created");
                Ok(item)
            }
            _ => Err(Self::error_from(response, "GitHub create issue failed").await),
        }
    }

    async fn update_issue(
        &self,
        repo: &str,
        number: u64,
        request: UpdateItemRequest,
    ) -> Result<TrackedItem> {
        let (owner, name) = Self::parse_repo(repo)?;
        let url = format!(
            "{}/repos/{}/{}/issues/{}",
            self.rest_base_url, owner, name, number
        );

        info!(repo = %repo, number = %number, "Updating GitHub issue");

        let response = self
            .authed(self.client.patch(&url).json(&request))
            .timeout(WRITE_TIMEOUT)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            StatusCode::NOT_FOUND => Err(crate::BridgeError::Integration(format!(
                "Issue not found: {}#{}",
                repo, number
            ))),
            _ => Err(Self::error_from(response, "GitHub update failed").await),
        }
    }

    async fn add_comment(&self, repo: &str, number: u64, body: &str) -> Result<ItemComment> {
        let (owner, name) = Self::parse_repo(repo)?;
        let url = format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.rest_base_url, owner, name, number
        );

        info!(repo = %repo, number = %number, "Adding comment to GitHub issue");

        let request_body = CreateCommentRequest {
            body: body.to_string(),
        };

        let response = self
            .authed(self.client.post(&url).json(&request_body))
            .timeout(WRITE_TIMEOUT)
            .send()
            .await?;

        match response.status() {
            StatusCode::CREATED => Ok(response.json().await?),
            _ => Err(Self::error_from(response, "GitHub comment failed").await),
        }
    }

    async fn add_labels(&self, repo: &str, number: u64, labels: &[String]) -> Result<()> {
        let (owner, name) = Self::parse_repo(repo)?;
        let url = format!(
            "{}/repos/{}/{}/issues/{}/labels",
            self.rest_base_url, owner, name, number
        );

        debug!(repo = %repo, number = %number, labels = ?labels, "Adding labels");

        let request_body = AddLabelsRequest {
            labels: labels.to_vec(),
        };

        let response = self
            .authed(self.client.post(&url).json(&request_body))
            .timeout(WRITE_TIMEOUT)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => Ok(()),
            _ => Err(Self::error_from(response, "GitHub add labels failed").await),
        }
    }

    async fn ensure_label(&self, repo: &str, name: &str, color: &str) -> Result<()> {
        let (owner, repo_name) = Self::parse_repo(repo)?;
        let lookup_url = format!(
            "{}/repos/{}/{}/labels/{}",
            self.rest_base_url, owner, repo_name, name
        );

        let response = self
            .authed(self.client.get(&lookup_url))
            .timeout(GET_TIMEOUT)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                debug!(repo = %repo, label = %name, "Label already exists");
                Ok(())
            }
            StatusCode::NOT_FOUND => {
                let create_url =
                    format!("{}/repos/{}/{}/labels", self.rest_base_url, owner, repo_name);
                let request_body = CreateLabelRequest {
                    name: name.to_string(),
                    color: color.to_string(),
                };

                info!(repo = %repo, label = %name, "Creating label");

                let response = self
                    .authed(self.client.post(&create_url).json(&request_body))
                    .timeout(WRITE_TIMEOUT)
                    .send()
                    .await?;

                match response.status() {
                    // 422 means someone created it between lookup and create
                    StatusCode::CREATED | StatusCode::UNPROCESSABLE_ENTITY => Ok(()),
                    _ => Err(Self::error_from(response, "GitHub create label failed").await),
                }
            }
            _ => Err(Self::error_from(response, "GitHub label lookup failed").await),
        }
    }

    async fn list_comments(&self, repo: &str, number: u64) -> Result<Vec<ItemComment>> {
        let (owner, name) = Self::parse_repo(repo)?;
        let url = format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.rest_base_url, owner, name, number
        );

        debug!(repo = %repo, number = %number, "Listing GitHub comments");

        let response = self
            .authed(self.client.get(&url))
            .timeout(GET_TIMEOUT)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            _ => Err(Self::error_from(response, "GitHub list comments failed").await),
        }
    }

    async fn is_merged(&self, repo: &str, number: u64) -> Result<bool> {
        let (owner, name) = Self::parse_repo(repo)?;
        let url = format!(
            "{}/repos/{}/{}/pulls/{}/merge",
            self.rest_base_url, owner, name, number
        );

        debug!(repo = %repo, number = %number, "Checking PR merge state");

        let response = self
            .authed(self.client.get(&url))
            .timeout(GET_TIMEOUT)
            .send()
            .await?;

        match response.status() {
            StatusCode::NO_CONTENT => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(Self::error_from(response, "GitHub merge check failed").await),
        }
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("rest_base_url", &self.rest_base_url)
            .field("authenticated", &self.auth_token.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = GitHubClient::new().expect("Failed to create client");
        assert!(client.rest_base_url.contains("api.github.com"));
    }

    #[test]
    fn test_enterprise_base_url() {
        let client =
            GitHubClient::with_base_url("https://github.example.com/api/v3/").unwrap();
        assert_eq!(client.rest_base_url, "https://github.example.com/api/v3");
    }

    #[test]
    fn test_parse_repo() {
        let (owner, name) = GitHubClient::parse_repo("acme/widgets").unwrap();
        assert_eq!(owner, "acme");
        assert_eq!(name, "widgets");

        assert!(GitHubClient::parse_repo("no-slash").is_err());
        assert!(GitHubClient::parse_repo("/widgets").is_err());
    }

    #[test]
    fn test_with_token() {
        let client = GitHubClient::new().unwrap().with_token("ghp_test");
        assert!(client.is_authenticated());
    }
}
