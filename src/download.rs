//! Attachment downloads.
//!
//! Transient failures (connection errors, timeouts, 429 and 5xx) are retried a
//! fixed number of times; any other 4xx is permanent and fails immediately.

use crate::error::{MigrationError, MigrationResult};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("todo-migrate/", env!("CARGO_PKG_VERSION"));
const RETRY_DELAY_MS: u64 = 500;

/// Fetches raw bytes for a provider-hosted file.
pub trait Downloader: Send + Sync {
    fn download(&self, url: &str, headers: &[(String, String)]) -> MigrationResult<Vec<u8>>;
}

/// Outcome of a single attempt, used to decide whether to retry.
#[derive(Debug)]
enum Attempt {
    Done(Vec<u8>),
    Transient(String),
    Permanent(String),
}

/// Classify an HTTP status for retry purposes.
fn is_transient(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Blocking HTTP downloader with bounded timeout and retries.
pub struct HttpDownloader {
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl HttpDownloader {
    pub fn new(timeout: Duration, max_retries: u32) -> MigrationResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| MigrationError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            max_retries,
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
        })
    }

    fn attempt(&self, url: &str, headers: &[(String, String)]) -> Attempt {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = match request.send() {
            Ok(response) => response,
            Err(e) if e.is_timeout() || e.is_connect() || e.is_request() => {
                return Attempt::Transient(e.to_string());
            }
            Err(e) => return Attempt::Permanent(e.to_string()),
        };

        let status = response.status();
        if !status.is_success() {
            let reason = format!("HTTP {}", status);
            return if is_transient(status) {
                Attempt::Transient(reason)
            } else {
                Attempt::Permanent(reason)
            };
        }

        match response.bytes() {
            Ok(bytes) => Attempt::Done(bytes.to_vec()),
            Err(e) => Attempt::Transient(e.to_string()),
        }
    }
}

/// Drive `attempt` until it succeeds, fails permanently, or `max_retries`
/// retries are used up. The n-th retry waits `delay * n`.
fn with_retries(
    url: &str,
    max_retries: u32,
    delay: Duration,
    mut attempt: impl FnMut() -> Attempt,
) -> MigrationResult<Vec<u8>> {
    let mut attempt_no = 0;
    loop {
        match attempt() {
            Attempt::Done(bytes) => {
                debug!(size = bytes.len(), attempts = attempt_no + 1, "Downloaded attachment");
                return Ok(bytes);
            }
            Attempt::Permanent(reason) => return Err(MigrationError::download(url, reason)),
            Attempt::Transient(reason) => {
                if attempt_no >= max_retries {
                    return Err(MigrationError::download(
                        url,
                        format!("{} (after {} attempts)", reason, attempt_no + 1),
                    ));
                }
                attempt_no += 1;
                warn!(attempt = attempt_no, "Transient download failure, retrying: {}", reason);
                std::thread::sleep(delay * attempt_no);
            }
        }
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, url: &str, headers: &[(String, String)]) -> MigrationResult<Vec<u8>> {
        with_retries(url, self.max_retries, self.retry_delay, || self.attempt(url, headers))
    }
}
