use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::oneshot;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("Concurrency limit and wait queue are full")]
    Rejected,
    #[error("Limiter was dropped while waiting for a permit")]
    Closed,
}

/// Result of a single admission attempt against a [`ConcurrencyLimiter`].
#[derive(Debug)]
pub enum Admission {
    /// A permit was free; run now and drop the permit when finished.
    Admitted(Permit),
    /// All permits are busy; the waiter resolves once an earlier holder finishes.
    Queued(Waiter),
    /// Permits and queue slots are both exhausted.
    Rejected,
}

struct GateState {
    active: u32,
    waiters: VecDeque<oneshot::Sender<Permit>>,
}

struct Inner {
    permit_limit: u32,
    queue_limit: usize,
    state: Mutex<GateState>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(self: &Arc<Self>) {
        let mut state = self.lock();

        // Hand the slot straight to the oldest live waiter
        while let Some(waiter) = state.waiters.pop_front() {
            match waiter.send(Permit::new(self.clone())) {
                Ok(()) => return,
                Err(permit) => permit.disarm(),
            }
        }

        state.active = state.active.saturating_sub(1);
    }
}

/// Concurrency limiter with a bounded, oldest-first wait queue.
///
/// At most `permit_limit` holders run at once and at most `queue_limit`
/// callers wait for a permit. When both are full, new callers are rejected
/// outright without entering the queue. Permits are released on drop, so a
/// holder that errors or panics still frees its slot.
#[derive(Clone)]
pub struct ConcurrencyLimiter {
    inner: Arc<Inner>,
}

impl ConcurrencyLimiter {
    pub fn new(permit_limit: u32, queue_limit: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                permit_limit,
                queue_limit,
                state: Mutex::new(GateState {
                    active: 0,
                    waiters: VecDeque::with_capacity(queue_limit),
                }),
            }),
        }
    }

    /// Try to enter without blocking.
    pub fn attempt(&self) -> Admission {
        let mut state = self.inner.lock();

        if state.active < self.inner.permit_limit {
            state.active += 1;
            return Admission::Admitted(Permit::new(self.inner.clone()));
        }

        // Waiters that gave up no longer hold a queue slot
        state.waiters.retain(|waiter| !waiter.is_closed());

        if state.waiters.len() < self.inner.queue_limit {
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            Admission::Queued(Waiter { rx })
        } else {
            Admission::Rejected
        }
    }

    /// Enter, waiting in the queue if needed.
    pub async fn acquire(&self) -> Result<Permit, AdmissionError> {
        match self.attempt() {
            Admission::Admitted(permit) => Ok(permit),
            Admission::Queued(waiter) => waiter.admitted().await,
            Admission::Rejected => Err(AdmissionError::Rejected),
        }
    }

    pub fn active(&self) -> u32 {
        self.inner.lock().active
    }

    pub fn queued(&self) -> usize {
        self.inner
            .lock()
            .waiters
            .iter()
            .filter(|waiter| !waiter.is_closed())
            .count()
    }
}

/// Held while an admitted call runs; dropping it frees the slot.
#[must_use = "dropping a permit releases it immediately"]
pub struct Permit {
    inner: Option<Arc<Inner>>,
}

impl Permit {
    fn new(inner: Arc<Inner>) -> Self {
        Self { inner: Some(inner) }
    }

    // Used when a handoff fails: the slot stays counted as active
    fn disarm(mut self) {
        self.inner.take();
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            inner.release();
        }
    }
}

impl std::fmt::Debug for Permit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Permit").finish_non_exhaustive()
    }
}

/// A queued caller. Dropping it gives up its place in the queue.
#[derive(Debug)]
pub struct Waiter {
    rx: oneshot::Receiver<Permit>,
}

impl Waiter {
    pub async fn admitted(self) -> Result<Permit, AdmissionError> {
        self.rx.await.map_err(|_| AdmissionError::Closed)
    }
}
