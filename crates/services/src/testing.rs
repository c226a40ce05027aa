//! Scripted downstream used by the unit tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::downstream::{Downstream, DownstreamResponse};
use crate::error::TransportError;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub at: Instant,
    pub path: String,
    pub body: String,
}

/// Replays scripted results, then keeps answering with `fallback`
pub struct ScriptedDownstream {
    script: Mutex<VecDeque<Result<DownstreamResponse, TransportError>>>,
    fallback: DownstreamResponse,
    latency: Duration,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedDownstream {
    pub fn new(
        script: Vec<Result<DownstreamResponse, TransportError>>,
        fallback: DownstreamResponse,
    ) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            latency: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always(response: DownstreamResponse) -> Self {
        Self::new(Vec::new(), response)
    }

    /// Every call takes `latency` before answering
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn bodies(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.body).collect()
    }

    /// Time between consecutive calls
    pub fn gaps(&self) -> Vec<Duration> {
        self.calls()
            .windows(2)
            .map(|pair| pair[1].at - pair[0].at)
            .collect()
    }
}

#[async_trait]
impl Downstream for ScriptedDownstream {
    async fn post(&self, path: &str, body: String) -> Result<DownstreamResponse, TransportError> {
        self.calls.lock().unwrap().push(RecordedCall {
            at: Instant::now(),
            path: path.to_string(),
            body,
        });

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}
