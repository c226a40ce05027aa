//! The three services of the backflow pipeline
//!
//! - Service A accepts `/start` and `/webhook`, buffers items in a bounded
//!   queue and forwards them one at a time to service B with retries
//! - Service B admits requests through a token bucket, fails a share of
//!   them on purpose and relays the rest to service C
//! - Service C works slowly, then posts `done:<payload>` back to service A

pub mod client;
pub mod downstream;
pub mod error;
pub mod fault;
pub mod queue;
pub mod service_a;
pub mod service_b;
pub mod service_c;

#[cfg(test)]
mod testing;

pub use client::{retry_policy, RetryingClient};
pub use downstream::{Downstream, DownstreamResponse, HttpDownstream};
pub use error::{DispatcherError, QueueError, ServiceError, TransportError};
pub use fault::{FaultInjector, FixedSamples, ProbabilitySource, ThreadRngSource};
pub use queue::{
    work_queue, DispatchSummary, Dispatcher, DispatcherHandle, WorkQueue, WorkReceiver,
};
pub use service_a::{AppState, ServiceA};
pub use service_b::{ProcessState, ServiceB};
pub use service_c::{ServiceC, WorkerState};
