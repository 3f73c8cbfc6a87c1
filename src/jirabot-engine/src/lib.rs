//! Core of jirabot.
//!
//! Finds issue references in chat messages, resolves them to a Jira node,
//! gathers issue details, remote links and pull requests concurrently and
//! renders one Slack message per reference.
//!
//! # Flow
//!
//! ```text
//! MessageEvent -> ReferenceExtractor -> ProjectDirectory -> Aggregator -> render -> ChatTransport
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use jirabot_engine::{BotConfig, IssueBot};
//!
//! let config = BotConfig::load("jirabot.toml")?;
//! let slack = SlackApiClient::new(config.slack.to_slack_config())?;
//! let bot = IssueBot::from_config(&config, Arc::new(slack))?;
//! ```

pub mod config;
pub mod error;
pub mod extractor;
pub mod format;
pub mod handler;
pub mod pipeline;
pub mod projects;
pub mod status;

pub use config::BotConfig;
pub use error::{BotError, BotResult};
pub use extractor::{IssueReference, ReferenceExtractor};
pub use format::{AggregatedMessage, ChatPayload, DisplaySettings, render};
pub use handler::IssueBot;
pub use pipeline::{Aggregator, SectionRequest};
pub use projects::{DEFAULT_PROJECT, ProjectConfig, ProjectDirectory};
pub use status::StatusRules;
