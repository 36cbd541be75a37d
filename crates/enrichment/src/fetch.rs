//! Fetch/retry executor shared by every source adapter
//!
//! One HTTP client, one outbound token bucket, one retry policy. Transient
//! failures (timeout, 429, 5xx, transport) are retried with a linearly growing
//! delay; everything else fails on the first attempt.

use crate::errors::FetchFailure;
use backoff::backoff::Backoff;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use peptrack_common::config::EnrichmentConfig;
use peptrack_common::errors::{AppError, Result};
use peptrack_common::metrics;
use reqwest::header::RETRY_AFTER;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Longest server-requested pause we are willing to honor
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Delay of `base × attempt` between consecutive attempts
#[derive(Debug, Clone)]
struct AttemptBackoff {
    base: Duration,
    attempt: u32,
}

impl AttemptBackoff {
    fn new(base: Duration) -> Self {
        Self { base, attempt: 0 }
    }
}

impl Backoff for AttemptBackoff {
    fn reset(&mut self) {
        self.attempt = 0;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        self.attempt += 1;
        Some(self.base * self.attempt)
    }
}

/// Rate-limited, retrying JSON fetcher
pub struct FetchExecutor {
    client: reqwest::Client,
    limiter: DefaultDirectRateLimiter,
    max_retries: u32,
    retry_base: Duration,
}

impl FetchExecutor {
    pub fn new(config: &EnrichmentConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout())
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(AppError::HttpClient)?;

        let per_second = NonZeroU32::new(config.requests_per_second).ok_or_else(|| {
            AppError::configuration("enrichment.requests_per_second must be positive")
        })?;

        Ok(Self {
            client,
            limiter: RateLimiter::direct(Quota::per_second(per_second)),
            max_retries: config.max_retries,
            retry_base: config.retry_base(),
        })
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// GET `url` and decode the body as `T`.
    ///
    /// Transient failures are retried up to `max_retries` times; a failure
    /// that survives a retry comes back wrapped in `RetriesExhausted`.
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: Url) -> std::result::Result<T, FetchFailure> {
        let attempts = AtomicU32::new(0);

        let operation = || {
            let url = url.clone();
            let attempts = &attempts;
            async move {
                let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
                self.limiter.until_ready().await;

                let started = Instant::now();
                let result = self.attempt::<T>(&url).await;
                let elapsed = started.elapsed().as_secs_f64();

                match result {
                    Ok(value) => {
                        metrics::record_fetch("2xx", elapsed);
                        Ok(value)
                    }
                    Err(failure) => {
                        metrics::record_fetch(failure.status_class(), elapsed);
                        if !failure.is_transient() || attempt > self.max_retries {
                            return Err(backoff::Error::permanent(failure));
                        }
                        match &failure {
                            FetchFailure::RateLimited {
                                retry_after: Some(wait),
                                ..
                            } => {
                                let wait = (*wait).min(MAX_RETRY_AFTER);
                                Err(backoff::Error::retry_after(failure, wait))
                            }
                            _ => Err(backoff::Error::transient(failure)),
                        }
                    }
                }
            }
        };

        let notify = |failure: FetchFailure, wait: Duration| {
            metrics::record_fetch_retry();
            warn!(error = %failure, wait_ms = wait.as_millis() as u64, "Retrying fetch");
        };

        backoff::future::retry_notify(AttemptBackoff::new(self.retry_base), operation, notify)
            .await
            .map_err(|last| {
                let attempts = attempts.load(Ordering::Relaxed);
                if last.is_transient() && attempts > 1 {
                    FetchFailure::RetriesExhausted {
                        url: url.to_string(),
                        attempts,
                        last: Box::new(last),
                    }
                } else {
                    last
                }
            })
    }

    async fn attempt<T: DeserializeOwned>(&self, url: &Url) -> std::result::Result<T, FetchFailure> {
        debug!(url = %url, "GET");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| transport_failure(url, e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(FetchFailure::RateLimited {
                url: url.to_string(),
                retry_after,
            });
        }
        if status.is_server_error() {
            return Err(FetchFailure::Server {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(FetchFailure::Client {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| transport_failure(url, e))?;

        serde_json::from_slice(&body).map_err(|e| FetchFailure::Malformed {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

fn transport_failure(url: &Url, err: reqwest::Error) -> FetchFailure {
    if err.is_timeout() {
        FetchFailure::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchFailure::Transport {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

/// Join `segments` onto `base` (percent-encoding each) and append `params`
pub fn build_url(
    base: &str,
    segments: &[&str],
    params: &[(&str, &str)],
) -> std::result::Result<Url, FetchFailure> {
    let malformed = |message: String| FetchFailure::Malformed {
        url: base.to_string(),
        message,
    };

    let mut url = Url::parse(base).map_err(|e| malformed(e.to_string()))?;
    if !segments.is_empty() {
        url.path_segments_mut()
            .map_err(|_| malformed("base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
    }
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params);
    }
    Ok(url)
}
