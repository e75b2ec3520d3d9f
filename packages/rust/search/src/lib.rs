//! Web search over DuckDuckGo's HTML endpoint.
//!
//! The adapter never fails a request over provider trouble: rate limits are
//! retried with exponential backoff, and any other failure (or an exhausted
//! retry budget) yields an empty result list with a warning.

mod parser;

use std::time::Duration;

use async_trait::async_trait;
use explainer_shared::{ExplainerError, Result, SearchConfig, WebHit, WebSearch};
use reqwest::{Client, StatusCode};
use tracing::{debug, info, instrument, warn};

/// Hard cap on results per query, whatever the configuration says.
const MAX_RESULTS_CAP: usize = 5;

/// User-Agent string for search requests.
const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible; explainer/",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// Why one attempt did not produce results.
enum AttemptError {
    RateLimited(StatusCode),
    Failed(String),
}

pub struct DdgSearch {
    client: Client,
    endpoint: String,
    max_results: usize,
    max_attempts: u32,
    backoff_base: Duration,
}

impl DdgSearch {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExplainerError::Search(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/html/", config.base_url.trim_end_matches('/')),
            max_results: config.max_results.clamp(1, MAX_RESULTS_CAP),
            max_attempts: config.max_attempts.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
        })
    }

    async fn attempt(
        &self,
        query: &str,
        max_results: usize,
    ) -> std::result::Result<Vec<WebHit>, AttemptError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| AttemptError::Failed(e.to_string()))?;

        let status = response.status();
        // DuckDuckGo answers 202 with a challenge page when throttling.
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::ACCEPTED {
            return Err(AttemptError::RateLimited(status));
        }
        if !status.is_success() {
            return Err(AttemptError::Failed(format!("HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AttemptError::Failed(format!("failed to read body: {e}")))?;
        Ok(parser::parse_results(&body, max_results))
    }
}

#[async_trait]
impl WebSearch for DdgSearch {
    #[instrument(skip_all, fields(query = %query))]
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let max_results = max_results.clamp(1, self.max_results);

        for attempt in 0..self.max_attempts {
            match self.attempt(query, max_results).await {
                Ok(hits) => {
                    debug!(hits = hits.len(), attempt, "web search complete");
                    return Ok(hits);
                }
                Err(AttemptError::RateLimited(status)) => {
                    if attempt + 1 == self.max_attempts {
                        warn!(%status, attempt = attempt + 1, "search rate limited");
                        break;
                    }
                    let wait = self.backoff_base * 2u32.saturating_pow(attempt);
                    warn!(
                        %status,
                        attempt = attempt + 1,
                        wait_ms = wait.as_millis() as u64,
                        "search rate limited, backing off"
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(AttemptError::Failed(reason)) => {
                    warn!(%reason, "web search failed, continuing without web results");
                    return Ok(Vec::new());
                }
            }
        }

        info!(
            attempts = self.max_attempts,
            "rate limit persists, continuing without web results"
        );
        Ok(Vec::new())
    }

    fn provider(&self) -> &str {
        "duckduckgo"
    }
}
