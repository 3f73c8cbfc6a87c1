//! Project resolution.
//!
//! Every project key maps to a Jira node (URLs plus a tracker client).
//! Keys without their own entry use the mandatory `DEFAULT` node.

use std::collections::HashMap;
use std::sync::Arc;

use jirabot_jira::{IssueTracker, JiraClient};
use tracing::{debug, info};

use crate::config::BotConfig;
use crate::error::{BotError, BotResult};

/// Key of the fallback project entry.
pub const DEFAULT_PROJECT: &str = "DEFAULT";

/// Placeholder for the internal issue id in development-info templates.
pub const ISSUE_ID_PLACEHOLDER: &str = "%issueId%";

/// Settings of one project node.
#[derive(Clone)]
pub struct ProjectConfig {
    /// Effective project key (`DEFAULT` for the fallback node).
    pub project_key: String,
    /// Web root of Jira, e.g. `https://jira.example.com/`.
    pub base_url: String,
    /// Path of the issue browser below `base_url`, e.g. `browse/`.
    pub browse_path: String,
    /// Development-status path below `base_url` containing `%issueId%`.
    pub dev_info_path_template: String,
    pub tracker: Arc<dyn IssueTracker>,
}

impl std::fmt::Debug for ProjectConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectConfig")
            .field("project_key", &self.project_key)
            .field("base_url", &self.base_url)
            .field("browse_path", &self.browse_path)
            .field("dev_info_path_template", &self.dev_info_path_template)
            .finish_non_exhaustive()
    }
}

impl ProjectConfig {
    /// URL prefix that an issue key is appended to for browsing.
    pub fn browse_url(&self) -> String {
        format!("{}{}", self.base_url, self.browse_path)
    }

    /// Browser URL of an issue.
    pub fn issue_url(&self, key: &str) -> String {
        format!("{}{}", self.browse_url(), key)
    }

    /// Development-status URL for an internal issue id.
    pub fn dev_info_url(&self, issue_id: &str) -> String {
        format!(
            "{}{}",
            self.base_url,
            self.dev_info_path_template
                .replace(ISSUE_ID_PLACEHOLDER, issue_id)
        )
    }
}

/// All project nodes, looked up by project key.
#[derive(Debug, Clone)]
pub struct ProjectDirectory {
    projects: HashMap<String, ProjectConfig>,
}

impl ProjectDirectory {
    /// Build a directory; fails when there is no `DEFAULT` entry.
    pub fn new(entries: impl IntoIterator<Item = ProjectConfig>) -> BotResult<Self> {
        let projects: HashMap<String, ProjectConfig> = entries
            .into_iter()
            .map(|p| (p.project_key.to_ascii_uppercase(), p))
            .collect();

        if !projects.contains_key(DEFAULT_PROJECT) {
            return Err(BotError::Config(format!(
                "No {} project node configured",
                DEFAULT_PROJECT
            )));
        }

        Ok(Self { projects })
    }

    /// Build the directory with one Jira client per configured node.
    pub fn from_config(config: &BotConfig) -> BotResult<Self> {
        let mut entries = Vec::with_capacity(config.jira.len());
        for (key, section) in &config.jira {
            info!("Creating Jira API client for project node {}", key);
            let client = JiraClient::new(section.api.to_settings())?
                .with_verbose(config.logging.verbose_api);
            entries.push(ProjectConfig {
                project_key: key.clone(),
                base_url: section.base_url.clone(),
                browse_path: section.browse_path.clone(),
                dev_info_path_template: section.development_info_path.clone(),
                tracker: Arc::new(client),
            });
        }
        Self::new(entries)
    }

    /// Resolve a project key, falling back to `DEFAULT`.
    pub fn resolve(&self, project_key: &str) -> &ProjectConfig {
        match self.projects.get(&project_key.to_ascii_uppercase()) {
            Some(project) => project,
            None => {
                debug!("No node for project {}, using {}", project_key, DEFAULT_PROJECT);
                self.default_project()
            }
        }
    }

    /// The fallback node.
    pub fn default_project(&self) -> &ProjectConfig {
        // `new` guarantees the entry
        &self.projects[DEFAULT_PROJECT]
    }

    /// Number of configured nodes, `DEFAULT` included.
    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}
