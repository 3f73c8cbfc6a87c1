//! Jira and wiki clients for jirabot.
//!
//! This crate talks to the issue tracker and the wiki on behalf of the
//! aggregation pipeline:
//! - Issue details with subtasks (`IssueTracker::fetch_issue`)
//! - Remote links of an issue (`IssueTracker::fetch_remote_links`)
//! - Pull requests from the development-status endpoint
//! - Page titles of wiki pages (`PageTitleSource::fetch_title`)
//!
//! Both seams are traits so the pipeline can be driven by in-memory fakes.

pub mod client;
pub mod error;
pub mod http;
pub mod models;
pub mod wiki;

pub use client::{IssueTracker, JiraApiSettings, JiraClient};
pub use error::{TrackerError, TrackerResult};
pub use models::{IssueSnapshot, PullRequestInfo, RemoteLink, Reviewer, Subtask};
pub use wiki::{PageTitle, PageTitleSource, WikiClient, WikiSettings};
