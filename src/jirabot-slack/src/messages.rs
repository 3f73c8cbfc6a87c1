//! Outgoing message payloads for Slack.
//!
//! The bot posts a single mrkdwn text line plus a list of legacy
//! attachments (colored side bars with an author line), which is what
//! `chat.postMessage` renders for issue summaries.

use serde::{Deserialize, Serialize};

/// Escape the characters Slack treats as control sequences in mrkdwn.
///
/// # Example
///
/// ```rust
/// use jirabot_slack::escape_mrkdwn;
///
/// assert_eq!(escape_mrkdwn("a < b & c"), "a &lt; b &amp; c");
/// ```
pub fn escape_mrkdwn(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Legacy message attachment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Side bar color ("good", "warning", "danger" or a hex value).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Small author line shown above the text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    /// Icon shown next to the author line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_icon: Option<String>,
    /// Attachment body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Fields rendered as mrkdwn.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mrkdwn_in: Vec<String>,
}

impl Attachment {
    /// Create an empty attachment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the author line and its icon (a blank icon is left out).
    pub fn with_author(mut self, name: impl Into<String>, icon: impl Into<String>) -> Self {
        let icon = icon.into();
        self.author_name = Some(name.into());
        self.author_icon = (!icon.trim().is_empty()).then_some(icon);
        self
    }

    /// Set mrkdwn body text.
    pub fn with_mrkdwn_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        if !self.mrkdwn_in.iter().any(|field| field == "text") {
            self.mrkdwn_in.push("text".to_string());
        }
        self
    }

    /// Set the side bar color.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

/// A `chat.postMessage` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Target channel ID.
    pub channel: String,
    /// Main message text (mrkdwn).
    pub text: String,
    /// Attachments in display order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// Display name of the bot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Emoji used as the bot's avatar.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_emoji: Option<String>,
    /// Never unfurl links; the summary already describes them.
    pub unfurl_links: bool,
    /// Link channel names and user names.
    pub link_names: bool,
}

impl OutgoingMessage {
    /// Create a message for a channel.
    pub fn new(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            text: text.into(),
            attachments: Vec::new(),
            username: None,
            icon_emoji: None,
            unfurl_links: false,
            link_names: true,
        }
    }

    /// Set attachments.
    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    /// Post under a custom bot identity.
    pub fn with_identity(mut self, username: impl Into<String>, icon_emoji: impl Into<String>) -> Self {
        let username = username.into();
        let icon_emoji = icon_emoji.into();
        self.username = (!username.is_empty()).then_some(username);
        self.icon_emoji = (!icon_emoji.is_empty()).then_some(icon_emoji);
        self
    }
}
