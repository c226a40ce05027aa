//! Admission control and retry primitives for the backflow pipeline
//!
//! Everything here is independent of the HTTP layer:
//!
//! - `ConcurrencyLimiter`: bounded concurrent holders plus a bounded, oldest-first wait queue
//! - `TokenBucket`: periodic-refill token bucket that never queues
//! - `ExponentialBackoff`: attempt-indexed exponential delays
//! - `RetryPolicy`: decides whether and how long to wait before retrying an outbound call

pub mod backoff;
pub mod backpressure;
pub mod limiter;
pub mod retry;

pub use backoff::ExponentialBackoff;
pub use backpressure::{Admission, AdmissionError, ConcurrencyLimiter, Permit, Waiter};
pub use limiter::{RateLimitError, TokenBucket};
pub use retry::{
    parse_retry_after, AttemptOutcome, RetryDecision, RetryPolicy, RetryReason,
    DEFAULT_MAX_RETRIES,
};
