//! Issue reference extraction.
//!
//! Finds `PROJECT-123` tokens for the configured project keys in free
//! text. A key only counts when it stands on its own: `XABC-1` does not
//! reference `ABC`, and neither does `ABC-1x`. One configurable extender
//! character directly after the number (`ABC-1+`) is captured as a
//! modifier that asks for the detailed summary.

use regex::Regex;

use crate::error::{BotError, BotResult};

/// An issue reference found in a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueReference {
    /// Full upper-cased key, e.g. `ABC-123`.
    pub key: String,
    /// Configured spelling of the project key that matched.
    pub project_key: String,
    /// Extender character directly after the number, if present.
    pub modifier: Option<char>,
}

impl IssueReference {
    /// Check if the reference carries the extender.
    pub fn has_modifier(&self) -> bool {
        self.modifier.is_some()
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Compiled matcher for the configured project keys.
#[derive(Debug, Clone)]
pub struct ReferenceExtractor {
    pattern: Option<Regex>,
    project_keys: Vec<String>,
    extender: Option<char>,
}

impl ReferenceExtractor {
    /// Build an extractor for `project_keys`.
    ///
    /// Blank keys are ignored; with no keys left the extractor never
    /// matches.
    pub fn new<I, S>(project_keys: I, extender: Option<char>) -> BotResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let project_keys: Vec<String> = project_keys
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        let pattern = if project_keys.is_empty() {
            None
        } else {
            let alternation = project_keys
                .iter()
                .map(|k| regex::escape(k))
                .collect::<Vec<_>>()
                .join("|");
            let source = format!(r"(?i)(?:^|[^A-Za-z0-9_])(({})-[0-9]+)", alternation);
            Some(Regex::new(&source).map_err(|e| {
                BotError::Config(format!("Invalid project key pattern: {}", e))
            })?)
        };

        Ok(Self {
            pattern,
            project_keys,
            extender,
        })
    }

    /// Configured project keys.
    pub fn project_keys(&self) -> &[String] {
        &self.project_keys
    }

    /// Configured extender character.
    pub fn extender(&self) -> Option<char> {
        self.extender
    }

    /// Iterate the references in `text`, left to right.
    pub fn extract<'a>(&'a self, text: &'a str) -> References<'a> {
        References {
            extractor: self,
            text,
            pos: 0,
        }
    }

    /// Configured spelling of a matched project key.
    fn canonical_key(&self, matched: &str) -> String {
        self.project_keys
            .iter()
            .find(|k| k.eq_ignore_ascii_case(matched))
            .cloned()
            .unwrap_or_else(|| matched.to_ascii_uppercase())
    }
}

/// Lazy iterator over the references of one text.
#[derive(Debug, Clone)]
pub struct References<'a> {
    extractor: &'a ReferenceExtractor,
    text: &'a str,
    pos: usize,
}

impl Iterator for References<'_> {
    type Item = IssueReference;

    fn next(&mut self) -> Option<Self::Item> {
        let pattern = self.extractor.pattern.as_ref()?;

        while self.pos <= self.text.len() {
            let caps = pattern.captures_at(self.text, self.pos)?;
            let (Some(whole), Some(token), Some(project)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                return None;
            };

            let mut after = self.text[token.end()..].chars();
            let accepted = match after.next() {
                None => Some((None, token.end())),
                Some(c) if Some(c) == self.extractor.extender => {
                    match after.next() {
                        Some(next) if is_word_char(next) => {
                            // Not a modifier; the extender may still close the token.
                            (!is_word_char(c)).then_some((None, token.end()))
                        }
                        _ => Some((Some(c), token.end() + c.len_utf8())),
                    }
                }
                Some(c) if !is_word_char(c) => Some((None, token.end())),
                Some(_) => None,
            };

            match accepted {
                Some((modifier, resume_at)) => {
                    self.pos = resume_at;
                    return Some(IssueReference {
                        key: token.as_str().to_ascii_uppercase(),
                        project_key: self.extractor.canonical_key(project.as_str()),
                        modifier,
                    });
                }
                None => {
                    let skip = self.text[whole.start()..]
                        .chars()
                        .next()
                        .map_or(1, char::len_utf8);
                    self.pos = whole.start() + skip;
                }
            }
        }

        None
    }
}
