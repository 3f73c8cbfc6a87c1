//! Slack Web API client.
//!
//! Wraps the handful of Web API methods the bot uses and exposes the
//! posting side through the `ChatTransport` trait so message handlers can
//! be exercised without Slack.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::config::SlackConfig;
use crate::error::{SlackApiError, SlackError, SlackResult};
use crate::messages::OutgoingMessage;

/// User-Agent for Slack requests.
const USER_AGENT: &str = concat!("jirabot/", env!("CARGO_PKG_VERSION"));

/// Outbound side of the chat platform.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Post a message, returning its timestamp.
    async fn post_message(&self, message: &OutgoingMessage) -> SlackResult<String>;

    /// Delete a message posted by another app or user.
    async fn delete_message(&self, channel: &str, ts: &str) -> SlackResult<()>;
}

/// Client for the Slack Web API.
#[derive(Clone)]
pub struct SlackApiClient {
    config: SlackConfig,
    client: reqwest::Client,
}

impl std::fmt::Debug for SlackApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackApiClient")
            .field("config", &self.config)
            .finish()
    }
}

impl SlackApiClient {
    /// Create a new client with the given configuration.
    pub fn new(config: SlackConfig) -> SlackResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout())
            .build()
            .map_err(|e| SlackError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Get the configuration.
    pub fn config(&self) -> &SlackConfig {
        &self.config
    }

    /// Call `auth.test` and return the bot's user ID.
    pub async fn auth_test(&self) -> SlackResult<String> {
        let response = self
            .api_call("auth.test", self.config.bot_token(), &json!({}))
            .await?;

        response
            .get("user_id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| SlackError::Auth("auth.test returned no user_id".to_string()))
    }

    /// Get the WebSocket URL for Socket Mode.
    pub async fn open_socket_url(&self) -> SlackResult<String> {
        let response = self
            .api_call("apps.connections.open", self.config.app_token(), &json!({}))
            .await?;

        response
            .get("url")
            .and_then(|u| u.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| SlackError::Api("Missing url in response".to_string()))
    }

    /// Make an API call to Slack and check the `ok` flag.
    async fn api_call(&self, method: &str, token: &str, payload: &Value) -> SlackResult<Value> {
        let url = format!("{}/{}", self.config.api_base(), method);
        debug!("Calling Slack API method {}", method);

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .header("Content-Type", "application/json; charset=utf-8")
            .json(payload)
            .send()
            .await?;

        if response.status() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(30);
            return Err(SlackError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SlackError::Api(format!("{}: {}", status, body)));
        }

        let body: Value = response.json().await?;
        if body.get("ok").and_then(|v| v.as_bool()) != Some(true) {
            let error = body
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or("unknown");
            return Err(SlackApiError::new(error, format!("{} failed: {}", method, error)).into());
        }

        Ok(body)
    }
}

#[async_trait]
impl ChatTransport for SlackApiClient {
    async fn post_message(&self, message: &OutgoingMessage) -> SlackResult<String> {
        let payload = serde_json::to_value(message)?;
        let response = self
            .api_call("chat.postMessage", self.config.bot_token(), &payload)
            .await?;

        response
            .get("ts")
            .and_then(|ts| ts.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| SlackError::Api("Missing ts in response".to_string()))
    }

    async fn delete_message(&self, channel: &str, ts: &str) -> SlackResult<()> {
        let token = self.config.admin_token().ok_or_else(|| {
            SlackError::Config("Deleting messages requires an admin token".to_string())
        })?;

        self.api_call(
            "chat.delete",
            token,
            &json!({
                "channel": channel,
                "ts": ts,
                "as_user": true,
            }),
        )
        .await?;

        Ok(())
    }
}
