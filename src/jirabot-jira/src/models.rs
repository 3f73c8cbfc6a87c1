//! Issue, link and pull-request models.
//!
//! The public types are what the pipeline works with; the `*Response`
//! types mirror the Jira REST payloads and are converted with `From`.

use serde::{Deserialize, Serialize};

/// Snapshot of an issue as fetched from the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSnapshot {
    /// Internal numeric id (used by the development-status endpoint).
    pub id: String,
    /// Human key, e.g. `ABC-123`.
    pub key: String,
    pub summary: String,
    pub status_name: String,
    /// Subtasks in the order the tracker reports them.
    pub subtasks: Vec<Subtask>,
}

/// Subtask of an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub summary: String,
    pub status_name: String,
}

impl Subtask {
    /// Create a subtask.
    pub fn new(summary: impl Into<String>, status_name: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            status_name: status_name.into(),
        }
    }
}

/// Remote link attached to an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteLink {
    pub url: String,
}

/// Reviewer of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reviewer {
    pub name: String,
    #[serde(default)]
    pub approved: bool,
}

/// Pull request linked to an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestInfo {
    pub url: String,
    pub name: String,
    /// Upstream status, e.g. `OPEN`, `MERGED`, `DECLINED`.
    pub status: String,
    #[serde(default)]
    pub reviewers: Vec<Reviewer>,
}

impl PullRequestInfo {
    /// Number of reviewers who approved.
    pub fn approvals(&self) -> usize {
        self.reviewers.iter().filter(|r| r.approved).count()
    }
}

// API response types

#[derive(Debug, Deserialize)]
pub(crate) struct JiraIssueResponse {
    id: String,
    key: String,
    fields: JiraIssueFields,
}

#[derive(Debug, Deserialize)]
struct JiraIssueFields {
    summary: String,
    status: JiraStatus,
    #[serde(default)]
    subtasks: Vec<JiraSubtaskResponse>,
}

#[derive(Debug, Deserialize)]
struct JiraStatus {
    name: String,
}

#[derive(Debug, Deserialize)]
struct JiraSubtaskResponse {
    fields: JiraSubtaskFields,
}

#[derive(Debug, Deserialize)]
struct JiraSubtaskFields {
    #[serde(default)]
    summary: String,
    status: JiraStatus,
}

impl From<JiraIssueResponse> for IssueSnapshot {
    fn from(response: JiraIssueResponse) -> Self {
        IssueSnapshot {
            id: response.id,
            key: response.key,
            summary: response.fields.summary,
            status_name: response.fields.status.name,
            subtasks: response
                .fields
                .subtasks
                .into_iter()
                .map(|s| Subtask {
                    summary: s.fields.summary,
                    status_name: s.fields.status.name,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RemoteLinkResponse {
    object: RemoteLinkObject,
}

#[derive(Debug, Deserialize)]
struct RemoteLinkObject {
    url: String,
}

impl From<RemoteLinkResponse> for RemoteLink {
    fn from(response: RemoteLinkResponse) -> Self {
        RemoteLink {
            url: response.object.url,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct DevStatusResponse {
    #[serde(default)]
    pub(crate) detail: Option<Vec<DevStatusDetail>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DevStatusDetail {
    #[serde(rename = "pullRequests", default)]
    pub(crate) pull_requests: Vec<PullRequestInfo>,
}

/// Upstream error payload (`{"errorMessages": [...]}`).
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorMessagesResponse {
    #[serde(rename = "errorMessages")]
    pub(crate) error_messages: Vec<String>,
}
