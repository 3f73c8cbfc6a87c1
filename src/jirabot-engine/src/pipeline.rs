//! Aggregation pipeline.
//!
//! For one issue reference the issue (followed by its development
//! information, which needs the internal id) and the remote links are
//! fetched concurrently and joined into an [`AggregatedMessage`]. Only a
//! failed issue fetch drops the reference; every other failure degrades
//! to a placeholder.

use std::sync::Arc;

use futures::future::join_all;
use jirabot_jira::{
    IssueTracker, PageTitleSource, PullRequestInfo, TrackerError, TrackerResult, WikiClient,
};
use tracing::{debug, error, warn};

use crate::config::BotConfig;
use crate::error::BotResult;
use crate::extractor::IssueReference;
use crate::format::{
    AggregatedMessage, DisplaySettings, MentionLink, PullRequestBlock, headline, mention_line,
    pull_request_block,
};
use crate::projects::ProjectConfig;
use crate::status::StatusRules;

/// Sections to fetch and show for one reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionRequest {
    pub status: bool,
    pub mentions: bool,
    pub dev_info: bool,
}

impl SectionRequest {
    /// Headline only.
    pub fn headline_only() -> Self {
        Self {
            status: false,
            mentions: false,
            dev_info: false,
        }
    }

    /// Every section.
    pub fn all() -> Self {
        Self {
            status: true,
            mentions: true,
            dev_info: true,
        }
    }
}

/// Builds aggregated messages for issue references.
pub struct Aggregator {
    rules: StatusRules,
    display: DisplaySettings,
    titles: Option<Arc<dyn PageTitleSource>>,
    wiki_base_urls: Vec<String>,
    extender_gating: bool,
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("rules", &self.rules)
            .field("display", &self.display)
            .field("scrape_titles", &self.titles.is_some())
            .field("wiki_base_urls", &self.wiki_base_urls)
            .field("extender_gating", &self.extender_gating)
            .finish()
    }
}

impl Aggregator {
    /// Create an aggregator without title scraping or extender gating.
    pub fn new(rules: StatusRules, display: DisplaySettings) -> Self {
        Self {
            rules,
            display,
            titles: None,
            wiki_base_urls: Vec::new(),
            extender_gating: false,
        }
    }

    /// Resolve link titles below `base_urls` (every link when empty).
    pub fn with_title_source(
        mut self,
        source: Arc<dyn PageTitleSource>,
        base_urls: Vec<String>,
    ) -> Self {
        self.titles = Some(source);
        self.wiki_base_urls = base_urls;
        self
    }

    /// Only show links and pull requests for references with the extender.
    pub fn with_extender_gating(mut self, enabled: bool) -> Self {
        self.extender_gating = enabled;
        self
    }

    /// Build the aggregator described by the configuration.
    pub fn from_config(config: &BotConfig) -> BotResult<Self> {
        let mut aggregator = Self::new(config.status_rules(), config.display.clone())
            .with_extender_gating(config.matching.extender().is_some());

        if config.wiki.scrape_titles {
            let client = WikiClient::new(config.wiki.to_settings())?;
            aggregator = aggregator.with_title_source(Arc::new(client), config.wiki.base_urls.clone());
        }

        Ok(aggregator)
    }

    pub fn display(&self) -> &DisplaySettings {
        &self.display
    }

    /// Sections shown for a reference found in a user message.
    pub fn sections_for(&self, reference: &IssueReference) -> SectionRequest {
        let detailed = !self.extender_gating || reference.has_modifier();
        SectionRequest {
            status: self.display.show_issue_status,
            mentions: self.display.show_issue_links && detailed,
            dev_info: self.display.show_development_information && detailed,
        }
    }

    /// Sections shown when every detail is asked for.
    pub fn full_sections(&self) -> SectionRequest {
        SectionRequest {
            status: self.display.show_issue_status,
            mentions: self.display.show_issue_links,
            dev_info: self.display.show_development_information,
        }
    }

    /// Aggregate a reference with the sections it asks for.
    pub async fn aggregate(
        &self,
        reference: &IssueReference,
        project: &ProjectConfig,
    ) -> Option<AggregatedMessage> {
        self.aggregate_with(reference, project, self.sections_for(reference))
            .await
    }

    /// Aggregate a reference with explicit sections.
    ///
    /// Returns `None` when the issue itself could not be fetched.
    pub async fn aggregate_with(
        &self,
        reference: &IssueReference,
        project: &ProjectConfig,
        sections: SectionRequest,
    ) -> Option<AggregatedMessage> {
        let tracker = project.tracker.as_ref();

        let issue_branch = async {
            let issue = tracker.fetch_issue(&reference.key).await?;
            let pull_requests = if sections.dev_info {
                let url = project.dev_info_url(&issue.id);
                Some(tracker.fetch_development_info(&url).await)
            } else {
                None
            };
            Ok::<_, TrackerError>((issue, pull_requests))
        };

        let mentions_branch = async {
            if sections.mentions {
                Some(self.mention_lines(tracker, &reference.key).await)
            } else {
                None
            }
        };

        let (issue_result, mention_block) = tokio::join!(issue_branch, mentions_branch);

        let (issue, pull_requests) = match issue_result {
            Ok(fetched) => fetched,
            Err(e) => {
                error!(
                    "Dropping {} (project {}): {}",
                    reference.key, project.project_key, e
                );
                return None;
            }
        };

        let status_line = sections
            .status
            .then(|| self.rules.derive_status(&issue))
            .filter(|status| !status.is_empty());

        let pull_request_blocks =
            pull_requests.map(|result| self.pull_request_blocks(&reference.key, result));

        debug!(
            "Aggregated {} (status: {:?}, links: {}, pull requests: {})",
            reference.key,
            status_line,
            mention_block.as_ref().map_or(0, Vec::len),
            pull_request_blocks.as_ref().map_or(0, Vec::len)
        );

        // Jira answers moved issues with their current key.
        let key = if issue.key.is_empty() {
            reference.key.as_str()
        } else {
            issue.key.as_str()
        };

        Some(AggregatedMessage {
            headline: headline(
                &self.display.texts.issue_prefix,
                &project.browse_url(),
                key,
                &issue.summary,
            ),
            status_line,
            mention_block,
            pull_request_blocks,
        })
    }

    async fn mention_lines(&self, tracker: &dyn IssueTracker, key: &str) -> Vec<String> {
        let links = match tracker.fetch_remote_links(key).await {
            Ok(links) if !links.is_empty() => links,
            Ok(_) => return vec![self.display.texts.links_not_available.clone()],
            Err(e) => {
                warn!("Links of {} not available: {}", key, e);
                return vec![self.display.texts.links_not_available.clone()];
            }
        };

        join_all(links.iter().map(|link| self.resolve_link(&link.url)))
            .await
            .iter()
            .map(mention_line)
            .collect()
    }

    fn looks_like_wiki(&self, url: &str) -> bool {
        self.wiki_base_urls.is_empty()
            || self
                .wiki_base_urls
                .iter()
                .any(|base| url.starts_with(base.as_str()))
    }

    async fn resolve_link(&self, url: &str) -> MentionLink {
        let Some(source) = self.titles.as_ref().filter(|_| self.looks_like_wiki(url)) else {
            return MentionLink::untitled(url);
        };

        match source.fetch_title(url).await {
            Ok(page) => MentionLink {
                target_url: page.final_url,
                resolved_title: page.title,
            },
            Err(TrackerError::AuthenticationFailure { redirect_url }) => {
                warn!("Wiki login failed for {}", url);
                MentionLink::untitled(redirect_url)
            }
            Err(e) => {
                debug!("No title for {}: {}", url, e);
                MentionLink::untitled(url)
            }
        }
    }

    fn pull_request_blocks(
        &self,
        key: &str,
        result: TrackerResult<Vec<PullRequestInfo>>,
    ) -> Vec<PullRequestBlock> {
        match result {
            Ok(pull_requests) if !pull_requests.is_empty() => pull_requests
                .iter()
                .map(|pr| pull_request_block(pr, &self.display))
                .collect(),
            Ok(_) => vec![self.pull_requests_placeholder()],
            Err(e) => {
                warn!("Development information of {} not available: {}", key, e);
                vec![self.pull_requests_placeholder()]
            }
        }
    }

    fn pull_requests_placeholder(&self) -> PullRequestBlock {
        PullRequestBlock::placeholder(self.display.texts.pull_requests_not_available.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::BlockColor;
    use crate::status::StatusConversionRule;
    use async_trait::async_trait;
    use jirabot_jira::{IssueSnapshot, PageTitle, RemoteLink, Reviewer, Subtask};
    use pretty_assertions::assert_eq;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex;

    struct FakeTracker {
        issue: TrackerResult<IssueSnapshot>,
        links: TrackerResult<Vec<RemoteLink>>,
        pull_requests: TrackerResult<Vec<PullRequestInfo>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeTracker {
        fn healthy() -> Self {
            Self {
                issue: Ok(IssueSnapshot {
                    id: "10042".to_string(),
                    key: "ABC-1".to_string(),
                    summary: "Login page".to_string(),
                    status_name: "In Progress".to_string(),
                    subtasks: vec![Subtask::new("fix the login bug", "In Progress")],
                }),
                links: Ok(vec![
                    RemoteLink {
                        url: "https://wiki.example.com/pages/1".to_string(),
                    },
                    RemoteLink {
                        url: "https://elsewhere.example.com/doc".to_string(),
                    },
                ]),
                pull_requests: Ok(vec![PullRequestInfo {
                    url: "https://git.example.com/pr/7".to_string(),
                    name: "Fix login".to_string(),
                    status: "MERGED".to_string(),
                    reviewers: vec![Reviewer {
                        name: "Ada Lovelace".to_string(),
                        approved: true,
                    }],
                }]),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl IssueTracker for FakeTracker {
        async fn fetch_issue(&self, key: &str) -> TrackerResult<IssueSnapshot> {
            self.record(format!("issue {}", key));
            self.issue.clone()
        }

        async fn fetch_remote_links(&self, key: &str) -> TrackerResult<Vec<RemoteLink>> {
            self.record(format!("links {}", key));
            self.links.clone()
        }

        async fn fetch_development_info(&self, url: &str) -> TrackerResult<Vec<PullRequestInfo>> {
            self.record(format!("dev {}", url));
            self.pull_requests.clone()
        }
    }

    #[derive(Default)]
    struct FakeTitles {
        pages: HashMap<String, TrackerResult<PageTitle>>,
    }

    #[async_trait]
    impl PageTitleSource for FakeTitles {
        async fn fetch_title(&self, url: &str) -> TrackerResult<PageTitle> {
            self.pages
                .get(url)
                .cloned()
                .unwrap_or_else(|| Err(TrackerError::MalformedResponse(url.to_string())))
        }
    }

    fn project(tracker: Arc<FakeTracker>) -> ProjectConfig {
        ProjectConfig {
            project_key: "DEFAULT".to_string(),
            base_url: "https://jira.example.com/".to_string(),
            browse_path: "browse/".to_string(),
            dev_info_path_template: "rest/dev-status/detail?issueId=%issueId%".to_string(),
            tracker,
        }
    }

    fn rules() -> StatusRules {
        StatusRules::new(
            BTreeMap::from([(2, "In Progress".to_string())]),
            None,
            vec![StatusConversionRule::new("Bugfixing", 2, vec!["bug".to_string()])],
        )
    }

    fn reference(modifier: Option<char>) -> IssueReference {
        IssueReference {
            key: "ABC-1".to_string(),
            project_key: "ABC".to_string(),
            modifier,
        }
    }

    fn wiki_titles() -> Arc<FakeTitles> {
        let mut titles = FakeTitles::default();
        titles.pages.insert(
            "https://wiki.example.com/pages/1".to_string(),
            Ok(PageTitle {
                final_url: "https://wiki.example.com/display/Login".to_string(),
                title: "Login design".to_string(),
            }),
        );
        Arc::new(titles)
    }

    #[tokio::test]
    async fn test_full_aggregation() {
        let tracker = Arc::new(FakeTracker::healthy());
        let aggregator = Aggregator::new(rules(), DisplaySettings::default())
            .with_title_source(wiki_titles(), vec!["https://wiki.example.com/".to_string()]);

        let message = aggregator
            .aggregate(&reference(None), &project(tracker.clone()))
            .await
            .unwrap();

        assert_eq!(
            message.headline,
            "<https://jira.example.com/browse/ABC-1|ABC-1 - Login page>"
        );
        assert_eq!(message.status_line.as_deref(), Some("Bugfixing"));
        assert_eq!(
            message.mention_block,
            Some(vec![
                "\n<https://wiki.example.com/display/Login| - Login design>".to_string(),
                "\n<https://elsewhere.example.com/doc| - https://elsewhere.example.com/doc>"
                    .to_string(),
            ])
        );

        let blocks = message.pull_request_blocks.unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].color, BlockColor::Warning);
        assert_eq!(
            blocks[0].text,
            "`Backend` `MERGED` <https://git.example.com/pr/7| Fix login>\n~Ada~"
        );

        assert!(tracker
            .calls()
            .contains(&"dev https://jira.example.com/rest/dev-status/detail?issueId=10042".to_string()));
    }

    #[tokio::test]
    async fn test_headline_uses_key_returned_by_jira() {
        let mut tracker = FakeTracker::healthy();
        if let Ok(issue) = tracker.issue.as_mut() {
            issue.key = "NEW-5".to_string();
        }
        let aggregator = Aggregator::new(rules(), DisplaySettings::default());

        let message = aggregator
            .aggregate(&reference(None), &project(Arc::new(tracker)))
            .await
            .unwrap();

        assert_eq!(
            message.headline,
            "<https://jira.example.com/browse/NEW-5|NEW-5 - Login page>"
        );
    }

    #[tokio::test]
    async fn test_issue_failure_drops_reference() {
        let mut tracker = FakeTracker::healthy();
        tracker.issue = Err(TrackerError::NotFound("ABC-1".to_string()));
        let tracker = Arc::new(tracker);
        let aggregator = Aggregator::new(rules(), DisplaySettings::default());

        let message = aggregator
            .aggregate(&reference(None), &project(tracker.clone()))
            .await;

        assert!(message.is_none());
        assert!(!tracker.calls().iter().any(|c| c.starts_with("dev ")));
    }

    #[tokio::test]
    async fn test_links_failure_degrades() {
        let mut tracker = FakeTracker::healthy();
        tracker.links = Err(TrackerError::UpstreamUnavailable("boom".to_string()));
        let aggregator = Aggregator::new(rules(), DisplaySettings::default());

        let message = aggregator
            .aggregate(&reference(None), &project(Arc::new(tracker)))
            .await
            .unwrap();

        assert_eq!(
            message.mention_block,
            Some(vec!["No links available.".to_string()])
        );
        assert_eq!(message.pull_request_blocks.unwrap()[0].color, BlockColor::Warning);
    }

    #[tokio::test]
    async fn test_missing_dev_info_degrades() {
        let mut tracker = FakeTracker::healthy();
        tracker.pull_requests = Err(TrackerError::NoDevInfo("unauthorized".to_string()));
        let aggregator = Aggregator::new(rules(), DisplaySettings::default());

        let message = aggregator
            .aggregate(&reference(None), &project(Arc::new(tracker)))
            .await
            .unwrap();

        assert_eq!(
            message.pull_request_blocks,
            Some(vec![PullRequestBlock::placeholder("No pull requests available.")])
        );
    }

    #[tokio::test]
    async fn test_empty_results_use_placeholders() {
        let mut tracker = FakeTracker::healthy();
        tracker.links = Ok(Vec::new());
        tracker.pull_requests = Ok(Vec::new());
        let aggregator = Aggregator::new(rules(), DisplaySettings::default());

        let message = aggregator
            .aggregate(&reference(None), &project(Arc::new(tracker)))
            .await
            .unwrap();

        assert_eq!(
            message.mention_block,
            Some(vec!["No links available.".to_string()])
        );
        assert_eq!(
            message.pull_request_blocks.unwrap()[0].color,
            BlockColor::Neutral
        );
    }

    #[tokio::test]
    async fn test_title_failures_fall_back_to_urls() {
        let mut tracker = FakeTracker::healthy();
        tracker.links = Ok(vec![
            RemoteLink {
                url: "https://wiki.example.com/secret".to_string(),
            },
            RemoteLink {
                url: "https://wiki.example.com/broken".to_string(),
            },
        ]);

        let mut titles = FakeTitles::default();
        titles.pages.insert(
            "https://wiki.example.com/secret".to_string(),
            Err(TrackerError::AuthenticationFailure {
                redirect_url: "https://wiki.example.com/login".to_string(),
            }),
        );

        let aggregator = Aggregator::new(rules(), DisplaySettings::default())
            .with_title_source(Arc::new(titles), Vec::new());

        let message = aggregator
            .aggregate(&reference(None), &project(Arc::new(tracker)))
            .await
            .unwrap();

        assert_eq!(
            message.mention_block,
            Some(vec![
                "\n<https://wiki.example.com/login| - https://wiki.example.com/login>".to_string(),
                "\n<https://wiki.example.com/broken| - https://wiki.example.com/broken>"
                    .to_string(),
            ])
        );
    }

    #[tokio::test]
    async fn test_extender_gating() {
        let tracker = Arc::new(FakeTracker::healthy());
        let aggregator =
            Aggregator::new(rules(), DisplaySettings::default()).with_extender_gating(true);

        let plain = aggregator
            .aggregate(&reference(None), &project(tracker.clone()))
            .await
            .unwrap();
        assert_eq!(plain.status_line.as_deref(), Some("Bugfixing"));
        assert!(plain.mention_block.is_none());
        assert!(plain.pull_request_blocks.is_none());
        assert_eq!(tracker.calls(), vec!["issue ABC-1".to_string()]);

        let extended = aggregator
            .aggregate(&reference(Some('+')), &project(tracker.clone()))
            .await
            .unwrap();
        assert!(extended.mention_block.is_some());
        assert!(extended.pull_request_blocks.is_some());
    }

    #[tokio::test]
    async fn test_display_toggles() {
        let tracker = Arc::new(FakeTracker::healthy());
        let display = DisplaySettings {
            show_issue_status: false,
            show_issue_links: false,
            show_development_information: false,
            ..DisplaySettings::default()
        };
        let aggregator = Aggregator::new(rules(), display);
        assert_eq!(aggregator.full_sections(), SectionRequest::headline_only());

        let message = aggregator
            .aggregate(&reference(Some('+')), &project(tracker.clone()))
            .await
            .unwrap();

        assert!(message.status_line.is_none());
        assert!(message.mention_block.is_none());
        assert!(message.pull_request_blocks.is_none());
        assert_eq!(tracker.calls(), vec!["issue ABC-1".to_string()]);
    }

    #[tokio::test]
    async fn test_unmatched_status_has_no_status_line() {
        let mut tracker = FakeTracker::healthy();
        if let Ok(issue) = tracker.issue.as_mut() {
            issue.subtasks = vec![Subtask::new("write docs", "In Progress")];
        }
        let aggregator = Aggregator::new(rules(), DisplaySettings::default());

        let message = aggregator
            .aggregate_with(&reference(None), &project(Arc::new(tracker)), SectionRequest::all())
            .await
            .unwrap();

        assert!(message.status_line.is_none());
    }
}
