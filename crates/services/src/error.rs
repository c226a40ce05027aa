use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use backflow_ratelimit::{AdmissionError, RateLimitError};
use std::time::Duration;
use thiserror::Error;

/// Failure to get any response out of a downstream service
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to read response body: {0}")]
    Body(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else if e.is_body() || e.is_decode() {
            TransportError::Body(e.to_string())
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("work queue is closed")]
    Closed,

    #[error("timed out waiting for a work queue slot")]
    TimedOut,
}

impl QueueError {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueError::Closed => "closed",
            QueueError::TimedOut => "timed_out",
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatcherError {
    #[error("dispatcher task failed: {0}")]
    Join(String),
}

/// Errors surfaced by the HTTP handlers of the three services
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error(transparent)]
    RateLimited(#[from] RateLimitError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("downstream call failed: {0}")]
    Transport(#[from] TransportError),

    #[error("simulated transient fault")]
    InjectedFault,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServiceError::Admission(AdmissionError::Rejected) => StatusCode::TOO_MANY_REQUESTS,
            ServiceError::Admission(AdmissionError::Closed) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::RateLimited(RateLimitError::Exhausted { .. }) => {
                StatusCode::TOO_MANY_REQUESTS
            }
            ServiceError::RateLimited(RateLimitError::InvalidConfig(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ServiceError::Queue(_) => StatusCode::TOO_MANY_REQUESTS,
            ServiceError::Transport(_) => StatusCode::BAD_GATEWAY,
            ServiceError::InjectedFault => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut response = (status, self.to_string()).into_response();

        if let ServiceError::RateLimited(RateLimitError::Exhausted { retry_after }) = self {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(retry_after_secs(retry_after)),
            );
        }

        response
    }
}

/// Whole seconds for a `Retry-After` header, rounded up and never zero
pub fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}
