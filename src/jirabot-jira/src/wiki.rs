//! Wiki page title lookup.
//!
//! Remote links usually point at wiki pages whose URL says little; the
//! page's `<title>` reads much better in chat.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::debug;

use crate::error::{TrackerError, TrackerResult};
use crate::http::{DEFAULT_TIMEOUT, create_client};

/// Marker Confluence puts in the login page and login headers when
/// credentials are rejected.
const AUTH_FAILED_MARKER: &str = "AUTHENTICATED_FAILED";

/// Header Confluence uses to report the login outcome.
const LOGIN_REASON_HEADER: &str = "X-Seraph-LoginReason";

const TITLE_START: &str = "<title>";
const TITLE_END: &str = "</title>";

/// Title of a page together with the URL it was served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTitle {
    /// URL after following redirects.
    pub final_url: String,
    pub title: String,
}

/// Something that can resolve a page URL to a human title.
#[async_trait]
pub trait PageTitleSource: Send + Sync {
    /// Fetch the title of the page at `url`.
    async fn fetch_title(&self, url: &str) -> TrackerResult<PageTitle>;
}

/// Wiki connection settings.
#[derive(Clone)]
pub struct WikiSettings {
    /// Basic auth user (no auth when empty).
    pub user: String,
    pub password: SecretString,
    pub timeout: Duration,
}

impl Default for WikiSettings {
    fn default() -> Self {
        Self {
            user: String::new(),
            password: SecretString::new(String::new().into()),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl std::fmt::Debug for WikiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WikiSettings")
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// HTTP page title scraper.
pub struct WikiClient {
    client: reqwest::Client,
    settings: WikiSettings,
}

impl WikiClient {
    /// Create a new client.
    pub fn new(settings: WikiSettings) -> TrackerResult<Self> {
        let client = create_client(settings.timeout, false)?;
        Ok(Self { client, settings })
    }
}

/// Extract the trimmed text between the first `<title>` and `</title>`,
/// with HTML character references decoded.
pub fn extract_title(body: &str) -> Option<String> {
    let start = body.find(TITLE_START)? + TITLE_START.len();
    let len = body[start..].find(TITLE_END)?;
    let title = decode_entities(body[start..start + len].trim());
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}

/// Decode named and numeric character references in one pass.
///
/// Unknown or unterminated references are kept as written.
fn decode_entities(text: &str) -> String {
    let mut decoded = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        decoded.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let resolved = rest
            .get(1..)
            .and_then(|after| after.find(';').filter(|end| *end <= 10))
            .and_then(|end| decode_entity(&rest[1..=end]).map(|c| (c, end + 2)));

        match resolved {
            Some((c, consumed)) => {
                decoded.push(c);
                rest = &rest[consumed..];
            }
            None => {
                decoded.push('&');
                rest = &rest[1..];
            }
        }
    }

    decoded.push_str(rest);
    decoded
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let code = name.strip_prefix('#')?;
            let value = match code.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(value)
        }
    }
}

#[async_trait]
impl PageTitleSource for WikiClient {
    async fn fetch_title(&self, url: &str) -> TrackerResult<PageTitle> {
        let mut request = self.client.get(url);
        if !self.settings.user.is_empty() {
            request = request.basic_auth(
                &self.settings.user,
                Some(self.settings.password.expose_secret()),
            );
        }

        let response = request.send().await?;
        let final_url = response.url().to_string();
        let auth_failed = response
            .headers()
            .get(LOGIN_REASON_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains(AUTH_FAILED_MARKER));
        let body = response.text().await?;

        if auth_failed || body.contains(AUTH_FAILED_MARKER) {
            return Err(TrackerError::AuthenticationFailure {
                redirect_url: final_url,
            });
        }

        match extract_title(&body) {
            Some(title) => Ok(PageTitle { final_url, title }),
            None => {
                debug!(url = %url, "No title element found");
                Err(TrackerError::MalformedResponse(format!(
                    "No title element found for {}",
                    url
                )))
            }
        }
    }
}
