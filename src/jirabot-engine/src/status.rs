//! Display status derivation.
//!
//! Teams that track work with subtasks on a board get a more useful status
//! than the story's own workflow state: the first conversion rule that a
//! subtask satisfies (right column, matching summary) names the status.
//! An on-hold marker in the story summary overrides everything.

use std::collections::BTreeMap;

use jirabot_jira::IssueSnapshot;

/// Substring that matches any summary.
pub const WILDCARD: &str = "*";

/// Status shown when the story summary carries an on-hold marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnHoldOverride {
    pub display_status: String,
    /// Matched case-sensitively against the story summary.
    pub match_substrings: Vec<String>,
}

impl OnHoldOverride {
    pub fn new(display_status: impl Into<String>, match_substrings: Vec<String>) -> Self {
        Self {
            display_status: display_status.into(),
            match_substrings,
        }
    }

    fn matches(&self, summary: &str) -> bool {
        self.match_substrings
            .iter()
            .any(|s| s == WILDCARD || summary.contains(s.as_str()))
    }
}

/// Maps a subtask in a board column with a matching summary to a status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusConversionRule {
    pub display_status: String,
    /// Column index the subtask must be in.
    pub required_column: u32,
    /// Matched case-insensitively against subtask summaries.
    pub match_substrings: Vec<String>,
    /// Set when the substrings contain the wildcard.
    pub match_any: bool,
}

impl StatusConversionRule {
    pub fn new(
        display_status: impl Into<String>,
        required_column: u32,
        match_substrings: Vec<String>,
    ) -> Self {
        let match_any = match_substrings.iter().any(|s| s == WILDCARD);
        Self {
            display_status: display_status.into(),
            required_column,
            match_substrings: match_substrings
                .into_iter()
                .map(|s| s.to_lowercase())
                .collect(),
            match_any,
        }
    }

    fn matches_summary(&self, summary: &str) -> bool {
        if self.match_any {
            return true;
        }
        let summary = summary.to_lowercase();
        self.match_substrings
            .iter()
            .any(|s| summary.contains(s.as_str()))
    }
}

/// Board columns and the ordered rule set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusRules {
    columns: BTreeMap<u32, String>,
    on_hold: Option<OnHoldOverride>,
    conversions: Vec<StatusConversionRule>,
}

impl StatusRules {
    pub fn new(
        columns: BTreeMap<u32, String>,
        on_hold: Option<OnHoldOverride>,
        conversions: Vec<StatusConversionRule>,
    ) -> Self {
        Self {
            columns,
            on_hold,
            conversions,
        }
    }

    /// Check if subtask-driven derivation is configured at all.
    pub fn is_configured(&self) -> bool {
        !self.columns.is_empty() && !self.conversions.is_empty()
    }

    /// Derive the display status of an issue.
    ///
    /// Returns the raw status when the issue has no subtasks or no rules
    /// are configured, and an empty string when no rule applies.
    pub fn derive_status(&self, issue: &IssueSnapshot) -> String {
        if issue.subtasks.is_empty() || !self.is_configured() {
            return issue.status_name.clone();
        }

        if let Some(on_hold) = &self.on_hold
            && on_hold.matches(&issue.summary)
        {
            return on_hold.display_status.clone();
        }

        self.conversions
            .iter()
            .find(|rule| {
                let Some(column) = self.columns.get(&rule.required_column) else {
                    return false;
                };
                issue
                    .subtasks
                    .iter()
                    .filter(|subtask| &subtask.status_name == column)
                    .any(|subtask| rule.matches_summary(&subtask.summary))
            })
            .map(|rule| rule.display_status.clone())
            .unwrap_or_default()
    }
}
