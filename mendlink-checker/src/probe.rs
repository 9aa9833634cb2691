use reqwest::Client;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

/// Outcome of validating a single URL within one scan cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ProbeOutcome {
    /// The URL answered with a success status.
    Healthy,
    /// Cross-origin URL that answered at all. We cannot meaningfully judge
    /// another origin's status for our document, so a response is trusted
    /// as healthy rather than assumed broken.
    Opaque,
    /// Every attempt failed; the link should be corrected.
    Broken { attempts: u32 },
    /// Not an absolute http/https URL; never probed, never corrected.
    Skipped,
    /// Already validated earlier in this cycle.
    Deduped,
}

impl ProbeOutcome {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ProbeOutcome::Healthy | ProbeOutcome::Opaque)
    }

    pub fn is_broken(&self) -> bool {
        matches!(self, ProbeOutcome::Broken { .. })
    }
}

/// Issues cache-bypassing HEAD existence checks with bounded retries and
/// linear backoff. Holds the checked-URL set for the current scan cycle.
pub struct LinkValidator {
    client: Client,
    checked: Arc<Mutex<HashSet<String>>>,
    max_attempts: u32,
    retry_delay: Duration,
    timeout: Duration,
    base_host: Option<String>,
}

impl LinkValidator {
    pub fn new() -> Self {
        let client = Client::builder()
            .user_agent("Mendlink/0.2 (https://github.com/mendlink/mendlink)")
            .redirect(reqwest::redirect::Policy::limited(5))
            .pool_max_idle_per_host(50)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            checked: Arc::new(Mutex::new(HashSet::new())),
            max_attempts: 3,
            retry_delay: Duration::from_millis(1000),
            timeout: Duration::from_secs(5),
            base_host: None,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Host of the site being checked. Links to any other host are treated
    /// as cross-origin and get the opaque-response trust rule.
    pub fn with_base_host(mut self, host: Option<String>) -> Self {
        self.base_host = host;
        self
    }

    /// Cycle boundary: forget every URL checked so far.
    pub async fn clear_checked(&self) {
        self.checked.lock().await.clear();
    }

    pub async fn checked_count(&self) -> usize {
        self.checked.lock().await.len()
    }

    /// Validate one URL. The URL joins the checked set as soon as
    /// validation begins, so a second caller in the same cycle dedups even
    /// while the first probe chain is still in flight.
    pub async fn validate(&self, raw_url: &str) -> ProbeOutcome {
        let parsed = match Url::parse(raw_url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => parsed,
            _ => {
                debug!("Skipping non-http link: {}", raw_url);
                return ProbeOutcome::Skipped;
            }
        };

        {
            let mut checked = self.checked.lock().await;
            if !checked.insert(raw_url.to_string()) {
                return ProbeOutcome::Deduped;
            }
        }

        let cross_origin = match (&self.base_host, parsed.host_str()) {
            (Some(base), Some(host)) => host != base,
            _ => false,
        };

        for attempt in 1..=self.max_attempts {
            match self.head(raw_url).await {
                Ok(status) => {
                    if cross_origin {
                        debug!("{} answered cross-origin ({}), trusting", raw_url, status);
                        return ProbeOutcome::Opaque;
                    }
                    if status.is_success() {
                        debug!("{} healthy ({})", raw_url, status);
                        return ProbeOutcome::Healthy;
                    }
                    debug!("{} attempt {} got status {}", raw_url, attempt, status);
                }
                Err(e) => {
                    debug!("{} attempt {} failed: {}", raw_url, attempt, e);
                }
            }
            if attempt < self.max_attempts {
                tokio::time::sleep(self.retry_delay * attempt).await;
            }
        }

        warn!(
            "Link check failed after {} attempts: {}",
            self.max_attempts, raw_url
        );
        ProbeOutcome::Broken {
            attempts: self.max_attempts,
        }
    }

    /// Existence check: HEAD, no body, caches bypassed. The deadline is a
    /// real race against a timer, not an advisory option on the request.
    async fn head(&self, url: &str) -> Result<reqwest::StatusCode, String> {
        let request = self
            .client
            .head(url)
            .header("Cache-Control", "no-cache")
            .header("Pragma", "no-cache")
            .send();

        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(response)) => Ok(response.status()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("timed out after {:?}", self.timeout)),
        }
    }
}

impl Default for LinkValidator {
    fn default() -> Self {
        Self::new()
    }
}
