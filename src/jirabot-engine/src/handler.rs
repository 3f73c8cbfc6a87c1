//! Message handling.
//!
//! [`IssueBot`] receives Slack message events, runs one pipeline per issue
//! reference and posts one message per successfully aggregated reference.
//! Failures are logged and never reach the listener loop.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use jirabot_slack::{ChatTransport, MessageEvent, SlackEventHandler, SlackResult};
use tracing::{debug, error, info, warn};

use crate::config::BotConfig;
use crate::error::BotResult;
use crate::extractor::{IssueReference, ReferenceExtractor};
use crate::format::render;
use crate::pipeline::{Aggregator, SectionRequest};
use crate::projects::ProjectDirectory;

/// Slack event handler that answers issue references.
pub struct IssueBot {
    extractor: ReferenceExtractor,
    projects: ProjectDirectory,
    aggregator: Aggregator,
    transport: Arc<dyn ChatTransport>,
    username: String,
    icon_emoji: String,
    intercept_app_messages: bool,
}

impl std::fmt::Debug for IssueBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssueBot")
            .field("extractor", &self.extractor)
            .field("projects", &self.projects)
            .field("aggregator", &self.aggregator)
            .field("username", &self.username)
            .field("icon_emoji", &self.icon_emoji)
            .field("intercept_app_messages", &self.intercept_app_messages)
            .finish_non_exhaustive()
    }
}

impl IssueBot {
    pub fn new(
        extractor: ReferenceExtractor,
        projects: ProjectDirectory,
        aggregator: Aggregator,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Self {
            extractor,
            projects,
            aggregator,
            transport,
            username: "JiraBot".to_string(),
            icon_emoji: ":bookmark_tabs:".to_string(),
            intercept_app_messages: false,
        }
    }

    /// Post under a custom name and emoji.
    pub fn with_identity(mut self, username: impl Into<String>, icon_emoji: impl Into<String>) -> Self {
        self.username = username.into();
        self.icon_emoji = icon_emoji.into();
        self
    }

    /// Replace Jira app posts with the bot's own summary.
    pub fn with_interception(mut self, enabled: bool) -> Self {
        self.intercept_app_messages = enabled;
        self
    }

    /// Wire the handler from the configuration.
    pub fn from_config(config: &BotConfig, transport: Arc<dyn ChatTransport>) -> BotResult<Self> {
        let extractor =
            ReferenceExtractor::new(&config.matching.project_keys, config.matching.extender())?;
        let projects = ProjectDirectory::from_config(config)?;
        let aggregator = Aggregator::from_config(config)?;

        info!(
            "Watching project keys {:?} with {} Jira node(s)",
            extractor.project_keys(),
            projects.len()
        );

        Ok(Self::new(extractor, projects, aggregator, transport)
            .with_identity(config.slack.bot_name.as_str(), config.slack.bot_emoji.as_str())
            .with_interception(config.slack.admin_token.is_some()))
    }

    /// Handle one message event; returns the number of messages posted.
    pub async fn process_message(&self, event: &MessageEvent) -> usize {
        if event.is_processable() {
            let text = event.text.as_deref().unwrap_or_default();
            let references: Vec<IssueReference> = self.extractor.extract(text).collect();
            if references.is_empty() {
                return 0;
            }

            debug!(
                "Found {} reference(s) in message {} of {}",
                references.len(),
                event.ts,
                event.channel
            );

            let posted = join_all(references.iter().map(|reference| {
                self.answer(&event.channel, reference, self.aggregator.sections_for(reference))
            }))
            .await;
            return posted.into_iter().filter(|ok| *ok).count();
        }

        if self.intercept_app_messages
            && let Some(link) = event.bot_attachment_link()
        {
            return usize::from(self.intercept(event, link).await);
        }

        0
    }

    /// Replace a Jira app post that links an issue.
    async fn intercept(&self, event: &MessageEvent, link: &str) -> bool {
        let Some(reference) = self.extractor.extract(link).next() else {
            return false;
        };

        if let Err(e) = self.transport.delete_message(&event.channel, &event.ts).await {
            warn!("Could not delete app message {} for {}: {}", event.ts, reference.key, e);
            return false;
        }

        info!("Replacing app message for {} in {}", reference.key, event.channel);
        self.answer(&event.channel, &reference, self.aggregator.full_sections())
            .await
    }

    async fn answer(
        &self,
        channel: &str,
        reference: &IssueReference,
        sections: SectionRequest,
    ) -> bool {
        let project = self.projects.resolve(&reference.project_key);
        let Some(message) = self
            .aggregator
            .aggregate_with(reference, project, sections)
            .await
        else {
            return false;
        };

        let outgoing = render(&message, self.aggregator.display()).into_message(
            channel,
            &self.username,
            &self.icon_emoji,
        );

        match self.transport.post_message(&outgoing).await {
            Ok(ts) => {
                debug!("Posted {} to {} ({})", reference.key, channel, ts);
                true
            }
            Err(e) => {
                error!("Failed to post {} to {}: {}", reference.key, channel, e);
                false
            }
        }
    }
}

#[async_trait]
impl SlackEventHandler for IssueBot {
    async fn handle_message(&self, event: MessageEvent) -> SlackResult<()> {
        self.process_message(&event).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::DisplaySettings;
    use crate::projects::{DEFAULT_PROJECT, ProjectConfig};
    use crate::status::StatusRules;
    use jirabot_jira::{
        IssueSnapshot, IssueTracker, PullRequestInfo, RemoteLink, TrackerError, TrackerResult,
    };
    use jirabot_slack::{MessageAttachment, OutgoingMessage, SlackError};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    struct FakeTracker;

    #[async_trait]
    impl IssueTracker for FakeTracker {
        async fn fetch_issue(&self, key: &str) -> TrackerResult<IssueSnapshot> {
            if key == "ABC-404" {
                return Err(TrackerError::NotFound(key.to_string()));
            }
            Ok(IssueSnapshot {
                id: "1".to_string(),
                key: key.to_string(),
                summary: format!("Summary of {}", key),
                status_name: "Open".to_string(),
                subtasks: Vec::new(),
            })
        }

        async fn fetch_remote_links(&self, _key: &str) -> TrackerResult<Vec<RemoteLink>> {
            Ok(Vec::new())
        }

        async fn fetch_development_info(&self, _url: &str) -> TrackerResult<Vec<PullRequestInfo>> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct FakeTransport {
        posted: Mutex<Vec<OutgoingMessage>>,
        deleted: Mutex<Vec<(String, String)>>,
        fail_posts: bool,
    }

    #[async_trait]
    impl ChatTransport for FakeTransport {
        async fn post_message(&self, message: &OutgoingMessage) -> SlackResult<String> {
            if self.fail_posts {
                return Err(SlackError::Channel("channel_not_found".to_string()));
            }
            self.posted.lock().unwrap().push(message.clone());
            Ok("1700000000.000100".to_string())
        }

        async fn delete_message(&self, channel: &str, ts: &str) -> SlackResult<()> {
            self.deleted
                .lock()
                .unwrap()
                .push((channel.to_string(), ts.to_string()));
            Ok(())
        }
    }

    fn bot(transport: Arc<FakeTransport>, extender_gating: bool) -> IssueBot {
        let projects = ProjectDirectory::new(vec![ProjectConfig {
            project_key: DEFAULT_PROJECT.to_string(),
            base_url: "https://jira.example.com/".to_string(),
            browse_path: "browse/".to_string(),
            dev_info_path_template: "dev?issueId=%issueId%".to_string(),
            tracker: Arc::new(FakeTracker),
        }])
        .unwrap();
        let extender = extender_gating.then_some('+');
        let extractor = ReferenceExtractor::new(["ABC"], extender).unwrap();
        let aggregator = Aggregator::new(StatusRules::default(), DisplaySettings::default())
            .with_extender_gating(extender_gating);
        IssueBot::new(extractor, projects, aggregator, transport)
    }

    fn posted_texts(transport: &FakeTransport) -> Vec<String> {
        let mut texts: Vec<String> = transport
            .posted
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.text.clone())
            .collect();
        texts.sort();
        texts
    }

    fn app_message(title_link: &str) -> MessageEvent {
        let mut event = MessageEvent::user_message("C1", "New issue created");
        event.subtype = Some("bot_message".to_string());
        event.ts = "1699999999.000200".to_string();
        event.attachments = vec![MessageAttachment {
            title: Some("ABC-5: Crash".to_string()),
            title_link: Some(title_link.to_string()),
            fallback: None,
        }];
        event
    }

    #[tokio::test]
    async fn test_posts_one_message_per_reference() {
        let transport = Arc::new(FakeTransport::default());
        let bot = bot(transport.clone(), false);

        let posted = bot
            .process_message(&MessageEvent::user_message("C1", "see ABC-1 and ABC-2"))
            .await;

        assert_eq!(posted, 2);
        assert_eq!(
            posted_texts(&transport),
            vec![
                "<https://jira.example.com/browse/ABC-1|ABC-1 - Summary of ABC-1> `Open`",
                "<https://jira.example.com/browse/ABC-2|ABC-2 - Summary of ABC-2> `Open`",
            ]
        );

        let message = &transport.posted.lock().unwrap()[0];
        assert_eq!(message.channel, "C1");
        assert_eq!(message.username.as_deref(), Some("JiraBot"));
        assert_eq!(message.attachments.len(), 3);
    }

    #[tokio::test]
    async fn test_failed_issue_is_not_posted() {
        let transport = Arc::new(FakeTransport::default());
        let bot = bot(transport.clone(), false);

        let posted = bot
            .process_message(&MessageEvent::user_message("C1", "ABC-404 ABC-3"))
            .await;

        assert_eq!(posted, 1);
        assert_eq!(transport.posted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ignores_unprocessable_messages() {
        let transport = Arc::new(FakeTransport::default());
        let bot = bot(transport.clone(), false);

        let mut from_bot = MessageEvent::user_message("C1", "ABC-1");
        from_bot.subtype = Some("bot_message".to_string());
        assert_eq!(bot.process_message(&from_bot).await, 0);

        let empty = MessageEvent::user_message("C1", "");
        assert_eq!(bot.process_message(&empty).await, 0);

        let unrelated = MessageEvent::user_message("C1", "nothing to see");
        assert_eq!(bot.process_message(&unrelated).await, 0);

        assert!(transport.posted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_own_post_is_not_answered() {
        let transport = Arc::new(FakeTransport::default());
        let bot = bot(transport.clone(), false).with_interception(true);

        bot.process_message(&MessageEvent::user_message("C1", "ABC-1"))
            .await;
        let own_text = transport.posted.lock().unwrap()[0].text.clone();

        let mut own_post = MessageEvent::user_message("C1", own_text);
        own_post.bot_id = Some("B0BOT".to_string());
        own_post.ts = "1700000000.000100".to_string();

        assert_eq!(bot.process_message(&own_post).await, 0);
        assert_eq!(transport.posted.lock().unwrap().len(), 1);
        assert!(transport.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_extender_controls_details() {
        let transport = Arc::new(FakeTransport::default());
        let bot = bot(transport.clone(), true);

        bot.process_message(&MessageEvent::user_message("C1", "ABC-1"))
            .await;
        bot.process_message(&MessageEvent::user_message("C1", "ABC-2+"))
            .await;

        let posted = transport.posted.lock().unwrap();
        assert!(posted[0].attachments.is_empty());
        assert_eq!(posted[1].attachments.len(), 3);
    }

    #[tokio::test]
    async fn test_post_failure_is_swallowed() {
        let transport = Arc::new(FakeTransport {
            fail_posts: true,
            ..FakeTransport::default()
        });
        let bot = bot(transport, false);

        let result = bot
            .handle_message(MessageEvent::user_message("C1", "ABC-1"))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_intercepts_app_messages() {
        let transport = Arc::new(FakeTransport::default());
        let bot = bot(transport.clone(), true).with_interception(true);

        let posted = bot
            .process_message(&app_message("https://jira.example.com/browse/ABC-5"))
            .await;

        assert_eq!(posted, 1);
        assert_eq!(
            transport.deleted.lock().unwrap().clone(),
            vec![("C1".to_string(), "1699999999.000200".to_string())]
        );
        let posted = transport.posted.lock().unwrap();
        assert!(posted[0].text.contains("ABC-5 - Summary of ABC-5"));
        // every section, even without the extender
        assert_eq!(posted[0].attachments.len(), 3);
    }

    #[tokio::test]
    async fn test_interception_disabled_or_unrelated() {
        let transport = Arc::new(FakeTransport::default());
        let bot = bot(transport.clone(), false);
        assert_eq!(
            bot.process_message(&app_message("https://jira.example.com/browse/ABC-5"))
                .await,
            0
        );

        let bot = bot.with_interception(true);
        assert_eq!(
            bot.process_message(&app_message("https://jira.example.com/browse/XYZ-5"))
                .await,
            0
        );
        assert!(transport.deleted.lock().unwrap().is_empty());
    }
}
