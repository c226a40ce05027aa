//! Response-aware retry policy for outbound calls
//!
//! The policy only decides; callers own the loop, the sleeping and the
//! actual I/O. That keeps it independent of any HTTP client.

use std::time::Duration;

use crate::backoff::ExponentialBackoff;

pub const DEFAULT_MAX_RETRIES: u32 = 5;

const TOO_MANY_REQUESTS: u16 = 429;
const REQUEST_TIMEOUT: u16 = 408;

/// What a single outbound attempt produced, as far as the policy cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome<'a> {
    /// The downstream answered with a status and, possibly, a `Retry-After` value.
    Response {
        status: u16,
        retry_after: Option<&'a str>,
    },
    /// Connection failure, timeout or other transport-level error.
    TransportError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    TooManyRequests,
    ServerError,
    Transport,
}

impl RetryReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetryReason::TooManyRequests => "too_many_requests",
            RetryReason::ServerError => "server_error",
            RetryReason::Transport => "transport",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait `delay`, then make retry number `attempt` (1-based).
    Retry {
        attempt: u32,
        delay: Duration,
        reason: RetryReason,
    },
    /// The outcome is final from the policy's point of view, even if it is a failure status.
    Complete,
    /// The outcome was transient but no retries remain.
    Exhausted { reason: RetryReason },
}

/// Bounded retry with `Retry-After`-aware backoff.
///
/// Transport errors, `429`, `408` and any `5xx` are transient. A `429`
/// carrying an integer `Retry-After` waits exactly that many seconds;
/// everything else waits according to the exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: ExponentialBackoff,
    honor_retry_after: bool,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: ExponentialBackoff) -> Self {
        Self {
            max_retries,
            backoff,
            honor_retry_after: true,
        }
    }

    pub fn with_retry_after(mut self, honor: bool) -> Self {
        self.honor_retry_after = honor;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Decide what follows an attempt, given how many retries were already made.
    pub fn decide(&self, retries_made: u32, outcome: &AttemptOutcome<'_>) -> RetryDecision {
        let reason = match classify(outcome) {
            Some(reason) => reason,
            None => return RetryDecision::Complete,
        };

        if retries_made >= self.max_retries {
            return RetryDecision::Exhausted { reason };
        }

        let attempt = retries_made + 1;
        RetryDecision::Retry {
            attempt,
            delay: self.delay_for(attempt, outcome),
            reason,
        }
    }

    fn delay_for(&self, attempt: u32, outcome: &AttemptOutcome<'_>) -> Duration {
        if self.honor_retry_after {
            if let AttemptOutcome::Response {
                status: TOO_MANY_REQUESTS,
                retry_after: Some(value),
            } = outcome
            {
                if let Some(delay) = parse_retry_after(value) {
                    return delay;
                }
            }
        }

        self.backoff.delay_for(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, ExponentialBackoff::default())
    }
}

fn classify(outcome: &AttemptOutcome<'_>) -> Option<RetryReason> {
    match outcome {
        AttemptOutcome::TransportError => Some(RetryReason::Transport),
        AttemptOutcome::Response {
            status: TOO_MANY_REQUESTS,
            ..
        } => Some(RetryReason::TooManyRequests),
        AttemptOutcome::Response { status, .. }
            if *status == REQUEST_TIMEOUT || (500..600).contains(status) =>
        {
            Some(RetryReason::ServerError)
        }
        AttemptOutcome::Response { .. } => None,
    }
}

/// Parse a delta-seconds `Retry-After` value. HTTP-date values are not supported.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
