//! External system clients
//!
//! The orchestrator talks to two collaborators through async traits: a
//! [`TrackedClient`] for the code-hosting system (GitHub issues/PRs) and
//! an [`ExternalClient`] for the support system (Salesforce cases). Any
//! call that errors surfaces as an operation failure to the orchestrator;
//! there is no retry logic at this layer.

pub mod github;
pub mod salesforce;

pub use github::GitHubClient;
pub use salesforce::SalesforceClient;

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A tracked item: an issue or pull request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedItem {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub state: String,
    #[serde(default)]
    pub labels: Vec<ItemLabel>,
    pub html_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemLabel {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemComment {
    pub id: u64,
    pub body: String,
}

/// Tracked item creation request
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateItemRequest {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

/// Tracked item update request; every field optional
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateItemRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

/// A support case in the external system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
    pub id: String,
    pub case_number: String,
    pub subject: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: String,
    #[serde(default)]
    pub priority: Option<String>,
}

/// Case creation request
#[derive(Debug, Clone, Default)]
pub struct CreateCaseRequest {
    pub subject: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    /// Tracked item to record on the new case
    pub tracked_ref: Option<TrackedRef>,
}

/// Case update; `None` fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct CaseUpdate {
    pub subject: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub tracked_ref: Option<TrackedRef>,
}

/// Pointer from a case back to its tracked item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedRef {
    pub repo: String,
    pub issue_number: u64,
    pub url: String,
}

/// Client for the code-hosting (tracked) system
#[async_trait]
pub trait TrackedClient: Send + Sync {
    /// Fetch an issue or PR. `repo` is "owner/name".
    async fn get_issue(&self, repo: &str, number: u64) -> Result<TrackedItem>;

    async fn create_issue(&self, repo: &str, request: CreateItemRequest) -> Result<TrackedItem>;

    async fn update_issue(
        &self,
        repo: &str,
        number: u64,
        request: UpdateItemRequest,
    ) -> Result<TrackedItem>;

    async fn add_comment(&self, repo: &str, number: u64, body: &str) -> Result<ItemComment>;

    async fn add_labels(&self, repo: &str, number: u64, labels: &[String]) -> Result<()>;

    /// Idempotently ensure a label exists: look it up by name, create it
    /// only on not-found.
    async fn ensure_label(&self, repo: &str, name: &str, color: &str) -> Result<()>;

    async fn list_comments(&self, repo: &str, number: u64) -> Result<Vec<ItemComment>>;

    /// Whether a pull request has been merged
    async fn is_merged(&self, repo: &str, number: u64) -> Result<bool>;
}

/// Client for the support (external) system
#[async_trait]
pub trait ExternalClient: Send + Sync {
    async fn get_case(&self, case_id: &str) -> Result<Case>;

    async fn create_case(&self, request: CreateCaseRequest) -> Result<Case>;

    async fn update_case(&self, case_id: &str, update: CaseUpdate) -> Result<Case>;

    async fn add_case_comment(&self, case_id: &str, body: &str) -> Result<()>;

    async fn close_case(&self, case_id: &str, resolution: &str) -> Result<Case>;

    /// Look up the case linked to a tracked item. Real implementations
    /// need a reverse index; the bundled client stubs this as not-found,
    /// which leaves case-initiated comment/status flows incomplete.
    async fn find_by_tracked_ref(&self, repo: &str, issue_number: u64) -> Result<Option<Case>>;

    /// Human-facing URL for a case
    fn case_url(&self, case_id: &str) -> String;
}
