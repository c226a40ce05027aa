//! Outbound HTTP seam between the services

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use std::time::Duration;

use crate::error::TransportError;

/// Status, `Retry-After` and body of a downstream answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownstreamResponse {
    pub status: u16,
    pub retry_after: Option<String>,
    pub body: String,
}

impl DownstreamResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            retry_after: None,
            body: String::new(),
        }
    }

    pub fn with_retry_after(mut self, value: impl Into<String>) -> Self {
        self.retry_after = Some(value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A service reachable by POSTing a plain-text payload to a path
#[async_trait]
pub trait Downstream: Send + Sync {
    async fn post(&self, path: &str, body: String) -> Result<DownstreamResponse, TransportError>;
}

/// `Downstream` backed by a reqwest client and a base URL
#[derive(Debug, Clone)]
pub struct HttpDownstream {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDownstream {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(TransportError::from)?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Downstream for HttpDownstream {
    async fn post(&self, path: &str, body: String) -> Result<DownstreamResponse, TransportError> {
        let response = self
            .client
            .post(self.url(path))
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        Ok(DownstreamResponse {
            status,
            retry_after,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_base_and_path() {
        let downstream =
            HttpDownstream::new("http://service-b/", Duration::from_secs(1)).unwrap();
        assert_eq!(downstream.url("/api/process"), "http://service-b/api/process");
    }

    #[test]
    fn test_response_builders() {
        let response = DownstreamResponse::new(429).with_retry_after("3");
        assert!(!response.is_success());
        assert_eq!(response.retry_after.as_deref(), Some("3"));
        assert!(response.body.is_empty());
        assert!(DownstreamResponse::new(204).is_success());
    }

    #[tokio::test]
    async fn test_closed_port_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let downstream =
            HttpDownstream::new(&format!("http://{addr}"), Duration::from_secs(2)).unwrap();
        let result = downstream.post("/webhook", "done:x".to_string()).await;
        assert!(result.is_err());
    }
}
