//! Best-effort operational alerts.
//!
//! The side channel every other best-effort path in the system follows:
//! bounded retries, linear backoff, and a final warn-and-drop. Nothing here
//! ever raises to, or blocks, the primary flow.

use std::time::Duration;

use tracing::{debug, warn};

pub const DEFAULT_MAX_ATTEMPTS: usize = 3;
pub const DEFAULT_BACKOFF_STEP_MS: u64 = 1_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub webhook_url: String,
    pub max_attempts: usize,
    /// Delay grows by this step per attempt: step, 2*step, ...
    pub backoff_step: Duration,
    pub request_timeout: Duration,
}

impl NotifierConfig {
    #[must_use]
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_step: Duration::from_millis(DEFAULT_BACKOFF_STEP_MS),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notifier {
    config: NotifierConfig,
    http: reqwest::Client,
}

impl Notifier {
    #[must_use]
    pub fn new(config: NotifierConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Send a short text alert to the webhook.
    ///
    /// Never returns an error: exhausting the retry budget is logged and
    /// reported as `false` so tests can observe the outcome.
    pub async fn notify(&self, text: &str) -> bool {
        let payload = serde_json::json!({ "text": text });
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let sent = self
                .http
                .post(&self.config.webhook_url)
                .timeout(self.config.request_timeout)
                .json(&payload)
                .send()
                .await;

            match sent {
                Ok(response) if response.status().is_success() => {
                    debug!(attempt, "alert delivered");
                    return true;
                }
                Ok(response) => {
                    warn!(attempt, status = %response.status(), "alert rejected");
                }
                Err(error) => {
                    warn!(attempt, %error, "alert send failed");
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.config.backoff_step * attempt as u32).await;
            }
        }

        warn!(
            attempts = max_attempts,
            "alert dropped after exhausting retries"
        );
        false
    }
}
