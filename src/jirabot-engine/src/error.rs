//! Error types for the bot engine.

use jirabot_jira::TrackerError;
use jirabot_slack::SlackError;
use thiserror::Error;

/// Errors raised while configuring or running the bot.
#[derive(Error, Debug)]
pub enum BotError {
    /// Invalid or incomplete configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Slack(#[from] SlackError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

/// Result type for engine operations.
pub type BotResult<T> = std::result::Result<T, BotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BotError::Config("no DEFAULT project".to_string());
        assert_eq!(err.to_string(), "Configuration error: no DEFAULT project");

        let err: BotError = TrackerError::NotFound("ABC-1".to_string()).into();
        assert_eq!(err.to_string(), "Issue not found: ABC-1");
    }
}
