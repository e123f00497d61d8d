//! Application-level health probe.
//!
//! Independent of OS liveness: a process may be alive but still booting.
//! Any transport failure counts as unhealthy and is never surfaced.

use std::time::Duration;

use tracing::debug;

/// HTTP GET prober with a fixed timeout.
#[derive(Debug, Clone)]
pub struct HealthChecker {
    client: reqwest::Client,
}

impl HealthChecker {
    /// Prober whose requests give up after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|err| {
                debug!(%err, "falling back to default http client");
                reqwest::Client::new()
            });
        Self { client }
    }

    /// `true` iff `url` answers with a 2xx status in time.
    pub async fn check(&self, url: &str) -> bool {
        match self.client.get(url).send().await {
            Ok(resp) => {
                let healthy = resp.status().is_success();
                debug!(url, status = resp.status().as_u16(), healthy, "health probe");
                healthy
            }
            Err(err) => {
                debug!(url, %err, "health probe failed");
                false
            }
        }
    }
}

/// URL probed by `status`: an explicit URL wins, otherwise `/health` under
/// the base URL.
#[must_use]
pub fn health_url(explicit: Option<&str>, base: Option<&str>) -> Option<String> {
    if let Some(url) = explicit.map(str::trim).filter(|u| !u.is_empty()) {
        return Some(url.to_owned());
    }
    base.map(|b| b.trim().trim_end_matches('/'))
        .filter(|b| !b.is_empty())
        .map(|b| format!("{b}/health"))
}
