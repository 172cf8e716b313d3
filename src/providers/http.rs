//! HTTP risk-lookup backend
//!
//! `GET {endpoint}/tokens/{address}` with a bearer credential. The address is
//! percent-encoded as a single path segment. The body is a
//! `RiskReport` JSON object. Transport failures, 429 and 5xx are retried
//! with exponential backoff plus jitter; any other failure returns
//! immediately.

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::{debug, error, warn};

use super::classifier::RiskClassifier;
use crate::models::{ErrorCode, HttpClassifierConfig, RiskReport, ScreenError, ScreenResult};
use crate::utils::constants::{retry_delay, RETRY_JITTER_PERCENT, USER_AGENT};

pub struct HttpRiskClassifier {
    config: HttpClassifierConfig,
    base_url: Url,
    client: Client,
}

impl HttpRiskClassifier {
    pub fn new(config: HttpClassifierConfig) -> ScreenResult<Self> {
        let base_url = Url::parse(&config.endpoint).map_err(|e| {
            ScreenError::with_source(
                ErrorCode::ConfigInvalidValue,
                format!("Invalid endpoint for {}: {}", config.name, config.endpoint),
                e,
            )
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ScreenError::invalid_config(format!(
                "Endpoint for {} cannot carry a path: {}",
                config.name, config.endpoint
            )));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .map_err(|e| {
                ScreenError::with_source(
                    ErrorCode::ConfigInvalidValue,
                    format!("Cannot build HTTP client for {}", config.name),
                    e,
                )
            })?;

        Ok(Self {
            config,
            base_url,
            client,
        })
    }

    pub fn config(&self) -> &HttpClassifierConfig {
        &self.config
    }

    /// `?`, `#` and `/` in the address are escaped, never interpreted
    fn url_for(&self, address: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("tokens").push(address);
        }
        url
    }

    async fn fetch(&self, url: &Url) -> ScreenResult<RiskReport> {
        let response = self
            .client
            .get(url.clone())
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScreenError::from_status(status.as_u16()));
        }

        Ok(response.json::<RiskReport>().await?)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let capped = retry_delay(self.config.retry_base_delay, attempt).as_millis() as i64;
        let jitter_range = capped * RETRY_JITTER_PERCENT as i64 / 100;
        let jitter: i64 = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
        Duration::from_millis((capped + jitter).max(0) as u64)
    }
}

#[async_trait]
impl RiskClassifier for HttpRiskClassifier {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn lookup(&self, address: &str) -> ScreenResult<RiskReport> {
        let url = self.url_for(address);
        let max_attempts = self.config.max_retries.max(1);
        let mut last_error = None;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                let delay = self.backoff(attempt);
                debug!(
                    "⏳ [{}] Retry {}/{} after {}ms",
                    self.config.name,
                    attempt + 1,
                    max_attempts,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            match self.fetch(&url).await {
                Ok(report) => return Ok(report),
                Err(e) if e.is_retryable() => {
                    warn!(
                        "⚠️ [{}] Lookup failed for {} (attempt {}/{}): {}",
                        self.config.name,
                        address,
                        attempt + 1,
                        max_attempts,
                        e
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        error!(
            "❌ [{}] Giving up on {} after {} attempts",
            self.config.name, address, max_attempts
        );
        Err(last_error.unwrap_or_else(|| {
            ScreenError::classifier_unavailable(format!("No attempts made for {}", address))
        }))
    }
}
