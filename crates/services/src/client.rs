//! Retrying wrapper around a [`Downstream`]

use std::sync::Arc;
use std::time::Duration;

use backflow_config::RetryConfig;
use backflow_metrics::MetricsCollector;
use backflow_ratelimit::{AttemptOutcome, ExponentialBackoff, RetryDecision, RetryPolicy};
use tracing::{debug, warn};

use crate::downstream::{Downstream, DownstreamResponse};
use crate::error::TransportError;

/// Build the retry policy for A's calls to B from configuration
pub fn retry_policy(config: &RetryConfig) -> RetryPolicy {
    let mut backoff = ExponentialBackoff::new(Duration::from_millis(config.base_delay_ms))
        .with_multiplier(config.multiplier);
    if let Some(max) = config.max_delay_ms {
        backoff = backoff.with_max(Duration::from_millis(max));
    }

    RetryPolicy::new(config.max_retries, backoff).with_retry_after(config.honor_retry_after)
}

/// Milliseconds in `delay`, saturating instead of truncating
fn whole_millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

/// Client that re-sends transient failures according to a [`RetryPolicy`]
///
/// Returns the last response or transport error once the policy stops
/// retrying. Failure statuses are not turned into errors.
#[derive(Clone)]
pub struct RetryingClient {
    inner: Arc<dyn Downstream>,
    policy: RetryPolicy,
    metrics: MetricsCollector,
}

impl RetryingClient {
    pub fn new(inner: Arc<dyn Downstream>, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            metrics: MetricsCollector::new(),
        }
    }

    pub async fn post(&self, path: &str, body: &str) -> Result<DownstreamResponse, TransportError> {
        let mut retries_made = 0;

        loop {
            let result = self.inner.post(path, body.to_string()).await;

            let outcome = match &result {
                Ok(response) => AttemptOutcome::Response {
                    status: response.status,
                    retry_after: response.retry_after.as_deref(),
                },
                Err(_) => AttemptOutcome::TransportError,
            };

            match self.policy.decide(retries_made, &outcome) {
                RetryDecision::Complete => return result,
                RetryDecision::Exhausted { reason } => {
                    warn!(
                        path,
                        retries = retries_made,
                        reason = reason.as_str(),
                        "Giving up after retries"
                    );
                    return result;
                }
                RetryDecision::Retry {
                    attempt,
                    delay,
                    reason,
                } => {
                    let wait_ms = whole_millis(delay);
                    match &result {
                        Ok(response) => warn!(
                            path,
                            attempt,
                            status = response.status,
                            wait_ms,
                            "Retry {attempt} after {delay:?}"
                        ),
                        Err(e) => warn!(
                            path,
                            attempt,
                            error = %e,
                            wait_ms,
                            "Retry {attempt} after {delay:?}"
                        ),
                    }
                    self.metrics.record_retry(reason.as_str());

                    tokio::time::sleep(delay).await;
                    debug!(path, attempt, "Retrying");
                    retries_made = attempt;
                }
            }
        }
    }
}
