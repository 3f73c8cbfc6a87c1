//! Jira REST API client.
//!
//! Reads issues, their remote links and the development-status detail
//! (pull requests) of an issue. The client never writes to Jira.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::error::{TrackerError, TrackerResult};
use crate::http::{DEFAULT_TIMEOUT, create_client};
use crate::models::{
    DevStatusResponse, ErrorMessagesResponse, IssueSnapshot, JiraIssueResponse, PullRequestInfo,
    RemoteLink, RemoteLinkResponse,
};

/// Read-only view of an issue tracker.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Fetch an issue with its subtasks by key.
    async fn fetch_issue(&self, key: &str) -> TrackerResult<IssueSnapshot>;

    /// Fetch the remote links of an issue.
    async fn fetch_remote_links(&self, key: &str) -> TrackerResult<Vec<RemoteLink>>;

    /// Fetch pull requests from a development-status URL.
    async fn fetch_development_info(&self, url: &str) -> TrackerResult<Vec<PullRequestInfo>>;
}

/// Connection details of one Jira API node.
#[derive(Clone)]
pub struct JiraApiSettings {
    /// `http` or `https`.
    pub protocol: String,
    pub host: String,
    pub port: Option<u16>,
    /// REST API version segment, e.g. `2`.
    pub version: String,
    pub user: String,
    pub password: SecretString,
    /// Verify TLS certificates.
    pub strict_ssl: bool,
    pub timeout: Duration,
}

impl std::fmt::Debug for JiraApiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JiraApiSettings")
            .field("protocol", &self.protocol)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("version", &self.version)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("strict_ssl", &self.strict_ssl)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl JiraApiSettings {
    /// Create settings for a host with API version 2 and no credentials.
    pub fn new(protocol: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            host: host.into(),
            port: None,
            version: "2".to_string(),
            user: String::new(),
            password: SecretString::new(String::new().into()),
            strict_ssl: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set basic auth credentials.
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = SecretString::new(password.into().into());
        self
    }

    /// Root URL of the node, e.g. `https://jira.example.com:8443`.
    pub fn root_url(&self) -> String {
        match self.port {
            Some(port) => format!("{}://{}:{}", self.protocol, self.host, port),
            None => format!("{}://{}", self.protocol, self.host),
        }
    }
}

/// Jira API client.
pub struct JiraClient {
    client: reqwest::Client,
    settings: JiraApiSettings,
    verbose: bool,
}

impl JiraClient {
    /// Create a new client for one API node.
    pub fn new(settings: JiraApiSettings) -> TrackerResult<Self> {
        let client = create_client(settings.timeout, !settings.strict_ssl)?;
        Ok(Self {
            client,
            settings,
            verbose: false,
        })
    }

    /// Log upstream response bodies at debug level.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Settings of this client.
    pub fn settings(&self) -> &JiraApiSettings {
        &self.settings
    }

    /// Build the API URL for a given endpoint.
    fn api_url(&self, endpoint: &str) -> String {
        format!(
            "{}/rest/api/{}{}",
            self.settings.root_url(),
            self.settings.version,
            endpoint
        )
    }

    /// GET a URL with basic auth and return the status and body.
    async fn get(&self, url: &str) -> TrackerResult<(reqwest::StatusCode, String)> {
        let mut request = self.client.get(url);
        if !self.settings.user.is_empty() {
            request = request.basic_auth(
                &self.settings.user,
                Some(self.settings.password.expose_secret()),
            );
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if self.verbose {
            debug!(url = %url, status = %status, "Jira API result: {}", body);
        }

        Ok((status, body))
    }

    /// GET a REST resource and decode it.
    async fn execute<T: DeserializeOwned>(&self, url: &str, subject: &str) -> TrackerResult<T> {
        let (status, body) = self.get(url).await?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(TrackerError::NotFound(subject.to_string()));
        }
        if !status.is_success() {
            return Err(TrackerError::UpstreamUnavailable(format!(
                "{}: Unable to connect to Jira",
                status
            )));
        }

        decode_body(&body)
    }
}

/// Decode a JSON body, treating `errorMessages` payloads as upstream errors.
fn decode_body<T: DeserializeOwned>(body: &str) -> TrackerResult<T> {
    if body.trim().is_empty() {
        return Err(TrackerError::MalformedResponse(
            "Response body was empty".to_string(),
        ));
    }

    let value: serde_json::Value = serde_json::from_str(body)?;
    if let Ok(errors) = serde_json::from_value::<ErrorMessagesResponse>(value.clone())
        && !errors.error_messages.is_empty()
    {
        return Err(TrackerError::UpstreamUnavailable(
            errors.error_messages.join("; "),
        ));
    }

    Ok(serde_json::from_value(value)?)
}

#[async_trait]
impl IssueTracker for JiraClient {
    async fn fetch_issue(&self, key: &str) -> TrackerResult<IssueSnapshot> {
        let url = self.api_url(&format!("/issue/{}", key));
        let response: JiraIssueResponse = self.execute(&url, key).await?;
        Ok(response.into())
    }

    async fn fetch_remote_links(&self, key: &str) -> TrackerResult<Vec<RemoteLink>> {
        let url = self.api_url(&format!("/issue/{}/remotelink", key));
        let response: Vec<RemoteLinkResponse> = self.execute(&url, key).await?;
        Ok(response.into_iter().map(Into::into).collect())
    }

    async fn fetch_development_info(&self, url: &str) -> TrackerResult<Vec<PullRequestInfo>> {
        let (status, body) = self.get(url).await?;

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(TrackerError::NoDevInfo(format!("{} for {}", status, url)));
        }
        if !status.is_success() {
            return Err(TrackerError::UpstreamUnavailable(format!(
                "{}: Unable to fetch development information",
                status
            )));
        }

        let response: DevStatusResponse = decode_body(&body)?;
        response
            .detail
            .and_then(|detail| detail.into_iter().next())
            .map(|detail| detail.pull_requests)
            .ok_or_else(|| TrackerError::NoDevInfo(format!("No detail for {}", url)))
    }
}
