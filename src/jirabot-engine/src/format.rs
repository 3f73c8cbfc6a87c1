//! Chat message formatting.
//!
//! Turns an aggregated issue summary into the Slack payload: one mrkdwn
//! headline plus attachments in a fixed order (links block, pull-request
//! header, one block per pull request).

use jirabot_jira::{PullRequestInfo, Reviewer};
use jirabot_slack::{Attachment, OutgoingMessage, escape_mrkdwn};
use serde::Deserialize;

/// Mention titles longer than this are shortened.
pub const MENTION_TITLE_LIMIT: usize = 70;
/// Length a long mention title is cut to.
pub const MENTION_TITLE_KEEP: usize = 50;
/// Pull-request names longer than this are shortened to this length.
pub const PULL_REQUEST_NAME_LIMIT: usize = 30;

const ELLIPSIS: &str = "...";

/// Which pull-request condition decides the side bar color.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorPrecedence {
    /// Checks run in sequence (good, warning, danger) and the last match
    /// wins, so any open request or one with fewer than two approvals is
    /// warning.
    #[default]
    LastMatch,
    /// Declined is danger, merged or two approvals is good, the rest warning.
    StatusFirst,
}

/// Side bar color of a pull-request block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockColor {
    Good,
    Warning,
    Danger,
    Neutral,
}

impl BlockColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockColor::Good => "good",
            BlockColor::Warning => "warning",
            BlockColor::Danger => "danger",
            BlockColor::Neutral => "#E3E4E6",
        }
    }

    /// Color of a pull request.
    pub fn for_pull_request(pr: &PullRequestInfo, precedence: ColorPrecedence) -> Self {
        let approvals = pr.approvals();
        match precedence {
            ColorPrecedence::StatusFirst => match pr.status.as_str() {
                "DECLINED" => BlockColor::Danger,
                "MERGED" => BlockColor::Good,
                _ if approvals >= 2 => BlockColor::Good,
                _ => BlockColor::Warning,
            },
            ColorPrecedence::LastMatch => {
                let mut color = BlockColor::Neutral;
                if pr.status == "MERGED" || approvals >= 2 {
                    color = BlockColor::Good;
                }
                if pr.status == "OPEN" || approvals < 2 {
                    color = BlockColor::Warning;
                }
                if pr.status == "DECLINED" {
                    color = BlockColor::Danger;
                }
                color
            }
        }
    }
}

/// Label shown for pull requests whose URL contains a substring.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PullRequestCategory {
    pub label: String,
    pub url_contains: String,
}

/// Custom texts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DisplayTexts {
    /// Text put before every headline.
    pub issue_prefix: String,
    pub links_text: String,
    pub pull_requests_text: String,
    pub links_not_available: String,
    pub pull_requests_not_available: String,
}

impl Default for DisplayTexts {
    fn default() -> Self {
        Self {
            issue_prefix: String::new(),
            links_text: "ISSUE LINKS".to_string(),
            pull_requests_text: "PULL REQUESTS".to_string(),
            links_not_available: "No links available.".to_string(),
            pull_requests_not_available: "No pull requests available.".to_string(),
        }
    }
}

/// Icons of the attachment author lines.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DisplayImages {
    pub links_image: String,
    pub pull_requests_image: String,
}

impl Default for DisplayImages {
    fn default() -> Self {
        Self {
            links_image: "https://cdn1.iconfinder.com/data/icons/silk2/page_white_link.png"
                .to_string(),
            pull_requests_image:
                "http://icons.iconarchive.com/icons/fatcow/farm-fresh/16/page-white-code-icon.png"
                    .to_string(),
        }
    }
}

/// What to show and how.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DisplaySettings {
    #[serde(default = "default_true")]
    pub show_issue_status: bool,

    #[serde(default = "default_true")]
    pub show_issue_links: bool,

    #[serde(default = "default_true")]
    pub show_development_information: bool,

    #[serde(default)]
    pub color_precedence: ColorPrecedence,

    /// Label for pull requests matching no category.
    #[serde(default = "default_pull_request_category")]
    pub default_pull_request_category: String,

    /// Checked in order; the first match wins.
    #[serde(default)]
    pub pull_request_categories: Vec<PullRequestCategory>,

    #[serde(default)]
    pub texts: DisplayTexts,

    #[serde(default)]
    pub images: DisplayImages,
}

fn default_true() -> bool {
    true
}

fn default_pull_request_category() -> String {
    "Backend".to_string()
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            show_issue_status: true,
            show_issue_links: true,
            show_development_information: true,
            color_precedence: ColorPrecedence::default(),
            default_pull_request_category: default_pull_request_category(),
            pull_request_categories: Vec::new(),
            texts: DisplayTexts::default(),
            images: DisplayImages::default(),
        }
    }
}

impl DisplaySettings {
    /// Category label of a pull request.
    pub fn category_for(&self, url: &str) -> &str {
        self.pull_request_categories
            .iter()
            .find(|c| url.contains(c.url_contains.as_str()))
            .map_or(self.default_pull_request_category.as_str(), |c| {
                c.label.as_str()
            })
    }
}

/// A remote link ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionLink {
    pub target_url: String,
    pub resolved_title: String,
}

impl MentionLink {
    /// A link shown with its URL as title.
    pub fn untitled(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            resolved_title: url.clone(),
            target_url: url,
        }
    }
}

/// One pull-request attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestBlock {
    pub color: BlockColor,
    pub text: String,
}

impl PullRequestBlock {
    /// Neutral block carrying a placeholder text.
    pub fn placeholder(text: impl Into<String>) -> Self {
        Self {
            color: BlockColor::Neutral,
            text: text.into(),
        }
    }
}

/// Everything known about one issue reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedMessage {
    pub headline: String,
    pub status_line: Option<String>,
    /// Formatted mention lines; `None` when links were not requested.
    pub mention_block: Option<Vec<String>>,
    /// `None` when development information was not requested.
    pub pull_request_blocks: Option<Vec<PullRequestBlock>>,
}

/// Text and attachments of a chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPayload {
    pub text: String,
    pub attachments: Vec<Attachment>,
}

impl ChatPayload {
    /// Address the payload to a channel under the bot's identity.
    pub fn into_message(
        self,
        channel: impl Into<String>,
        username: &str,
        icon_emoji: &str,
    ) -> OutgoingMessage {
        OutgoingMessage::new(channel, self.text)
            .with_attachments(self.attachments)
            .with_identity(username, icon_emoji)
    }
}

fn truncate_chars(text: &str, keep: usize) -> String {
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}

/// Shorten a mention title longer than 70 characters to 50 plus `...`.
pub fn truncate_mention_title(title: &str) -> String {
    if title.chars().count() > MENTION_TITLE_LIMIT {
        truncate_chars(title, MENTION_TITLE_KEEP)
    } else {
        title.to_string()
    }
}

/// Shorten a pull-request name longer than 30 characters.
pub fn truncate_pull_request_name(name: &str) -> String {
    if name.chars().count() > PULL_REQUEST_NAME_LIMIT {
        truncate_chars(name, PULL_REQUEST_NAME_LIMIT)
    } else {
        name.to_string()
    }
}

/// `\n<url| - title>`
pub fn mention_line(link: &MentionLink) -> String {
    format!(
        "\n<{}| - {}>",
        link.target_url,
        escape_mrkdwn(&truncate_mention_title(&link.resolved_title))
    )
}

/// Reviewer first names, approved ones struck through.
pub fn reviewers_line(reviewers: &[Reviewer]) -> String {
    if reviewers.is_empty() {
        return String::new();
    }

    let names: Vec<String> = reviewers
        .iter()
        .map(|r| {
            let first = escape_mrkdwn(r.name.split(' ').next().unwrap_or_default());
            if r.approved {
                format!("~{}~", first)
            } else {
                first
            }
        })
        .collect();

    format!("\n{}", names.join(" | "))
}

/// Pull-request block with category, status, link and reviewers.
pub fn pull_request_block(pr: &PullRequestInfo, display: &DisplaySettings) -> PullRequestBlock {
    let text = format!(
        "`{}` `{}` <{}| {}>{}",
        display.category_for(&pr.url),
        pr.status,
        pr.url,
        escape_mrkdwn(&truncate_pull_request_name(&pr.name)),
        reviewers_line(&pr.reviewers)
    );

    PullRequestBlock {
        color: BlockColor::for_pull_request(pr, display.color_precedence),
        text,
    }
}

/// `{prefix}<{browse_url}{key}|{key} - {summary}>`
pub fn headline(prefix: &str, browse_url: &str, key: &str, summary: &str) -> String {
    format!(
        "{}<{}{}|{} - {}>",
        prefix,
        browse_url,
        key,
        key,
        escape_mrkdwn(summary)
    )
}

/// Render an aggregated message.
pub fn render(message: &AggregatedMessage, display: &DisplaySettings) -> ChatPayload {
    let text = match message.status_line.as_deref() {
        Some(status) if !status.is_empty() => format!("{} `{}`", message.headline, status),
        _ => message.headline.clone(),
    };

    let mut attachments = Vec::new();

    if let Some(lines) = &message.mention_block {
        attachments.push(
            Attachment::new()
                .with_author(&display.texts.links_text, &display.images.links_image)
                .with_mrkdwn_text(lines.join(" ")),
        );
    }

    if let Some(blocks) = &message.pull_request_blocks {
        attachments.push(Attachment::new().with_author(
            &display.texts.pull_requests_text,
            &display.images.pull_requests_image,
        ));
        attachments.extend(blocks.iter().map(|block| {
            Attachment::new()
                .with_color(block.color.as_str())
                .with_mrkdwn_text(&block.text)
        }));
    }

    ChatPayload { text, attachments }
}
