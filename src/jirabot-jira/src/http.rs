//! HTTP client factory for Jira and wiki requests.
//!
//! All clients include:
//! - User-Agent: `jirabot/{version}`
//! - tcp_nodelay and a bounded idle pool
//! - A request timeout and a read timeout

use std::time::Duration;

use reqwest::Client;

use crate::error::{TrackerError, TrackerResult};

/// User-Agent string for all tracker requests.
pub const USER_AGENT: &str = concat!("jirabot/", env!("CARGO_PKG_VERSION"));

/// Default timeout for tracker requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Idle connections are dropped after this long so DNS is re-resolved.
pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Creates an HTTP client with the given timeout.
///
/// `accept_invalid_certs` turns off certificate verification for
/// self-hosted servers with self-signed certificates.
pub fn create_client(timeout: Duration, accept_invalid_certs: bool) -> TrackerResult<Client> {
    let read_timeout = timeout.min(Duration::from_secs(60));

    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .read_timeout(read_timeout)
        .tcp_nodelay(true)
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .pool_max_idle_per_host(4)
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()
        .map_err(|e| TrackerError::UpstreamUnavailable(format!("Failed to build HTTP client: {}", e)))
}
