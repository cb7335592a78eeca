//! Transport layer: the networking primitive every host request goes through.
//!
//! A single [`Transport`] is constructed per process and shared by reference.
//! It owns the global rate limiter and the relay "stickiness" state, so
//! callers never throttle or retry on their own.

mod rate_limit;
mod relay;

pub use rate_limit::RateLimiter;
pub use relay::{RelayConfig, RelayKind, Transport};

use crate::error::{HarvestError, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Browser-like user agent; the host serves reduced markup to unknown agents.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// HTTP method subset used by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// An outgoing request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Duration,
}

impl FetchRequest {
    /// A GET request with a 15 second timeout.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::Get,
            headers: Vec::new(),
            body: None,
            timeout: Duration::from_secs(15),
        }
    }

    /// A POST request with a JSON body.
    pub fn post_json(url: impl Into<String>, body: String) -> Self {
        Self {
            url: url.into(),
            method: Method::Post,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: Some(body),
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Same request aimed at a different URL.
    pub fn retarget(&self, url: String) -> Self {
        Self {
            url,
            ..self.clone()
        }
    }
}

/// A received response. Bodies are always read as text.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }

    /// Convert a non-2xx response into a transport error.
    pub fn error_for_status(self, url: &str) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(HarvestError::Transport(format!("HTTP {} from {}", self.status, url)))
        }
    }
}

/// Trait for the raw HTTP client underneath the transport.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// Perform one request. Non-2xx statuses are returned, not raised.
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse>;
}

/// `reqwest`-backed fetcher.
pub struct ReqwestFetcher {
    client: reqwest::Client,
    user_agent: String,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self> {
        Self::with_user_agent(DEFAULT_USER_AGENT)
    }

    pub fn with_user_agent(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            user_agent: user_agent.to_string(),
        })
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };

        builder = builder
            .timeout(request.timeout)
            .header("User-Agent", &self.user_agent)
            .header("Accept-Language", "en-US,en;q=0.9");

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                HarvestError::Transport(format!("Timed out after {:?}: {}", request.timeout, request.url))
            } else {
                HarvestError::Transport(format!("Request to {} failed: {}", request.url, e))
            }
        })?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(FetchResponse { status, body })
    }
}
