use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("token bucket exhausted, next token in {retry_after:?}")]
    Exhausted { retry_after: Duration },
    #[error("Invalid rate limit configuration: {0}")]
    InvalidConfig(String),
}

struct BucketState {
    tokens: u32,
    // Nanoseconds since `origin` of the last applied replenishment tick
    last_tick: u64,
}

/// Token bucket that replenishes a fixed number of tokens once per period.
///
/// Requests never queue: an acquisition either takes a token immediately or
/// fails. Replenishment ticks on a fixed cadence measured from construction,
/// so the observable token count is the same as with a background timer, but
/// it is computed lazily on each access. Refill and deduction happen under
/// one lock, so a tick is never observed half-applied.
pub struct TokenBucket {
    capacity: u32,
    tokens_per_period: u32,
    period_nanos: u64,
    origin: Instant,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn new(
        capacity: u32,
        tokens_per_period: u32,
        period: Duration,
    ) -> Result<Self, RateLimitError> {
        if capacity == 0 {
            return Err(RateLimitError::InvalidConfig(
                "capacity must be greater than 0".to_string(),
            ));
        }
        if tokens_per_period == 0 {
            return Err(RateLimitError::InvalidConfig(
                "tokens per period must be greater than 0".to_string(),
            ));
        }
        let period_nanos = u64::try_from(period.as_nanos()).unwrap_or(u64::MAX);
        if period_nanos == 0 {
            return Err(RateLimitError::InvalidConfig(
                "replenishment period must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            capacity,
            tokens_per_period,
            period_nanos,
            origin: Instant::now(),
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_tick: 0,
            }),
        })
    }

    fn now_nanos(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    /// Lock the bucket and apply every tick that has elapsed since the last access.
    fn refilled(&self) -> (MutexGuard<'_, BucketState>, u64) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.now_nanos();
        let periods = now.saturating_sub(state.last_tick) / self.period_nanos;

        if periods > 0 {
            // Advance by whole periods only so the tick cadence never drifts
            state.last_tick = state
                .last_tick
                .saturating_add(periods.saturating_mul(self.period_nanos));
            let periods = u32::try_from(periods).unwrap_or(u32::MAX);
            let tokens_to_add = periods.saturating_mul(self.tokens_per_period);
            state.tokens = state.tokens.saturating_add(tokens_to_add).min(self.capacity);
        }

        (state, now)
    }

    fn next_tick_in(&self, state: &BucketState, now: u64) -> Duration {
        let next = state.last_tick.saturating_add(self.period_nanos);
        Duration::from_nanos(next.saturating_sub(now))
    }

    /// Take one token if any are available.
    pub fn try_acquire(&self) -> bool {
        self.acquire().is_ok()
    }

    /// Like [`try_acquire`](Self::try_acquire), reporting how long until the next token on failure.
    pub fn acquire(&self) -> Result<(), RateLimitError> {
        let (mut state, now) = self.refilled();

        if state.tokens > 0 {
            state.tokens -= 1;
            Ok(())
        } else {
            Err(RateLimitError::Exhausted {
                retry_after: self.next_tick_in(&state, now),
            })
        }
    }

    pub fn remaining(&self) -> u32 {
        self.refilled().0.tokens
    }

    /// Time until the next replenishment tick.
    pub fn retry_after(&self) -> Duration {
        let (state, now) = self.refilled();
        self.next_tick_in(&state, now)
    }
}
