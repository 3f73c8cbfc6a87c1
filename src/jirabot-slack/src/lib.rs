//! Slack transport for jirabot.
//!
//! This crate carries everything the bot needs to talk to Slack:
//! - Socket Mode listener for real-time channel messages
//! - Message event parsing and filtering
//! - Legacy attachment payloads for `chat.postMessage`
//! - Web API client (`chat.postMessage`, `chat.delete`, `auth.test`)
//!
//! # Architecture
//!
//! The `SlackBot` owns the WebSocket connection and hands every channel
//! message to a `SlackEventHandler`. Handlers reply through the
//! `ChatTransport` trait, implemented for Slack by `SlackApiClient`.
//!
//! # Example
//!
//! ```rust,ignore
//! use jirabot_slack::{SlackBot, SlackConfig};
//!
//! let config = SlackConfig::from_env()?;
//! let bot = SlackBot::new(config)?;
//! bot.set_event_handler(my_handler).await;
//! bot.start().await?;
//! ```
//!
//! # Configuration
//!
//! Required:
//! - `JIRABOT_SLACK_BOT_TOKEN` - Bot OAuth token (xoxb-...)
//! - `JIRABOT_SLACK_APP_TOKEN` - App-level token for Socket Mode (xapp-...)
//!
//! Optional:
//! - `JIRABOT_SLACK_ADMIN_TOKEN` - User token allowed to delete Jira app posts

pub mod api;
pub mod bot;
pub mod config;
pub mod error;
pub mod events;
pub mod messages;

// Re-export main types
pub use api::{ChatTransport, SlackApiClient};
pub use bot::{BotOptions, SlackBot};
pub use config::SlackConfig;
pub use error::{SlackApiError, SlackError, SlackResult};
pub use events::{MessageAttachment, MessageEvent, SlackEvent, SlackEventHandler};
pub use messages::{Attachment, OutgoingMessage, escape_mrkdwn};
