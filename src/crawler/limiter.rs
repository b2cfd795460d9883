//! Request dispatch with throttling and adaptive backoff
//!
//! All outbound requests go through one [`RateLimiter`] instance, which
//! enforces a minimum inter-dispatch interval and retries 429 responses
//! with doubling backoff. Throttle state lives in explicit fields of the
//! limiter (not process globals) so independent crawl targets can run
//! with isolated state. Every physical attempt is recorded in the api
//! call log as a best-effort two-phase write.

use crate::config::UserAgentConfig;
use crate::storage::Storage;
use crate::{Result, SkimmerError};
use chrono::Utc;
use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use std::time::{Duration, Instant};

/// A successfully fetched listing page
#[derive(Debug)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

/// Backoff schedule for consecutive 429s within one dispatch
///
/// An explicit Retry-After hint is obeyed verbatim and does not grow the
/// schedule; otherwise each consecutive 429 doubles the next sleep.
#[derive(Debug)]
pub struct BackoffState {
    current: Duration,
}

impl BackoffState {
    pub fn new(base: Duration) -> Self {
        Self { current: base }
    }

    /// Returns how long to sleep before the next retry
    pub fn next_delay(&mut self, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(hint) => hint,
            None => {
                let delay = self.current;
                self.current = self.current.saturating_mul(2);
                delay
            }
        }
    }
}

/// Builds the HTTP client used for all dispatches
///
/// User agent format: `CrawlerName/Version (+ContactURL; ContactEmail)`.
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client> {
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Ok(Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()?)
}

/// Single-slot global throttle with per-dispatch 429 backoff
pub struct RateLimiter {
    client: Client,
    min_interval: Duration,
    backoff_base: Duration,
    last_dispatch_end: Option<Instant>,
    last_was_limited: bool,
}

impl RateLimiter {
    pub fn new(client: Client, min_interval: Duration, backoff_base: Duration) -> Self {
        Self {
            client,
            min_interval,
            backoff_base,
            last_dispatch_end: None,
            last_was_limited: false,
        }
    }

    /// Dispatches one logical request, retrying through 429 backoff
    ///
    /// Rate limiting is retried indefinitely and never surfaces as an
    /// error. Non-429 error statuses and network errors are not retried;
    /// they propagate to the caller. Each physical attempt becomes one
    /// api call record.
    pub async fn dispatch<S: Storage>(
        &mut self,
        storage: &mut S,
        url: &str,
    ) -> Result<FetchedPage> {
        // Minimum spacing, measured from the end of the previous dispatch
        // to the start of this one
        if let Some(prev_end) = self.last_dispatch_end {
            let elapsed = prev_end.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }

        // Backoff scope is one dispatch: unrelated requests never compound
        let mut backoff = BackoffState::new(self.backoff_base);
        let mut attempts: u32 = 0;
        self.last_was_limited = false;

        loop {
            attempts += 1;
            let call_id = self.log_start(storage, url);

            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    self.log_end(storage, call_id, Some(status.as_u16()));

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        self.last_was_limited = true;
                        let retry_after = parse_retry_after(&response);
                        let delay = backoff.next_delay(retry_after);
                        tracing::warn!(
                            url,
                            attempt = attempts,
                            delay_ms = delay.as_millis() as u64,
                            explicit_hint = retry_after.is_some(),
                            "rate limited, backing off"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    if !status.is_success() {
                        self.last_dispatch_end = Some(Instant::now());
                        return Err(SkimmerError::HttpStatus {
                            url: url.to_string(),
                            status: status.as_u16(),
                        });
                    }

                    let body = response.text().await.map_err(|source| SkimmerError::Http {
                        url: url.to_string(),
                        source,
                    })?;
                    self.last_dispatch_end = Some(Instant::now());
                    return Ok(FetchedPage {
                        status: status.as_u16(),
                        body,
                    });
                }
                Err(source) => {
                    self.log_end(storage, call_id, None);
                    self.last_dispatch_end = Some(Instant::now());
                    return Err(SkimmerError::Http {
                        url: url.to_string(),
                        source,
                    });
                }
            }
        }
    }

    /// Whether the most recent dispatch needed more than one attempt
    pub fn was_rate_limited(&self) -> bool {
        self.last_was_limited
    }

    // Log writes never block or fail the dispatch; a failed write is a
    // degraded-observability condition, not a crawl-halting one.
    fn log_start<S: Storage>(&self, storage: &mut S, url: &str) -> Option<i64> {
        match storage.log_call_start(url, Utc::now()) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(url, error = %e, "failed to record api call start");
                None
            }
        }
    }

    fn log_end<S: Storage>(&self, storage: &mut S, call_id: Option<i64>, status: Option<u16>) {
        if let Some(id) = call_id {
            if let Err(e) = storage.log_call_end(id, status, Utc::now()) {
                tracing::warn!(call_id = id, error = %e, "failed to record api call end");
            }
        }
    }
}

/// Parses a `Retry-After` header as a positive integer of seconds
///
/// Anything else (absent, HTTP-date form, zero, garbage) falls back to
/// the internal backoff schedule.
fn parse_retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}
