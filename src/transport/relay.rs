//! Relay configuration and the rate-limited, relay-falling-back transport.

use super::{FetchRequest, FetchResponse, HttpFetcher, RateLimiter};
use crate::error::{HarvestError, Result};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// How a relay wraps the target URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RelayKind {
    /// No relay; request the target directly.
    #[default]
    Direct,
    /// Relay URL followed by the raw target URL.
    Prefix,
    /// Relay URL followed by the percent-encoded target URL.
    Query,
}

/// One relay configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    pub name: String,
    #[serde(default)]
    pub kind: RelayKind,
    #[serde(default)]
    pub url: String,
}

impl RelayConfig {
    pub fn direct() -> Self {
        Self {
            name: "direct".to_string(),
            kind: RelayKind::Direct,
            url: String::new(),
        }
    }

    pub fn prefix(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: RelayKind::Prefix,
            url: url.to_string(),
        }
    }

    pub fn query(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: RelayKind::Query,
            url: url.to_string(),
        }
    }

    /// The URL to request so that this relay reaches `target`.
    pub fn wrap(&self, target: &str) -> String {
        match self.kind {
            RelayKind::Direct => target.to_string(),
            RelayKind::Prefix => format!("{}{}", self.url, target),
            RelayKind::Query => {
                let encoded: String =
                    url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
                format!("{}{}", self.url, encoded)
            }
        }
    }
}

/// Upper bound on a single backoff sleep.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Exponential backoff for `attempt` (0-based), capped at [`MAX_BACKOFF`].
pub fn backoff_for(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(MAX_BACKOFF)
}

/// Shared transport state: fetcher, rate limiter, relays and relay stickiness.
pub struct Transport {
    fetcher: Arc<dyn HttpFetcher>,
    limiter: RateLimiter,
    relays: Vec<RelayConfig>,
    preferred: Mutex<Option<usize>>,
    max_retries_per_relay: u32,
    base_backoff: Duration,
}

impl Transport {
    pub fn new(fetcher: Arc<dyn HttpFetcher>, min_interval: Duration) -> Self {
        Self {
            fetcher,
            limiter: RateLimiter::new(min_interval),
            relays: vec![RelayConfig::direct()],
            preferred: Mutex::new(None),
            max_retries_per_relay: 3,
            base_backoff: Duration::from_secs(1),
        }
    }

    /// Replace the relay list. An empty list falls back to a direct relay.
    pub fn with_relays(mut self, relays: Vec<RelayConfig>) -> Self {
        self.relays = if relays.is_empty() {
            vec![RelayConfig::direct()]
        } else {
            relays
        };
        self
    }

    pub fn with_retries(mut self, max_retries_per_relay: u32) -> Self {
        self.max_retries_per_relay = max_retries_per_relay.max(1);
        self
    }

    pub fn with_backoff(mut self, base_backoff: Duration) -> Self {
        self.base_backoff = base_backoff;
        self
    }

    pub fn relays(&self) -> &[RelayConfig] {
        &self.relays
    }

    /// Name of the relay that last succeeded, if any.
    pub fn preferred_relay(&self) -> Option<String> {
        let preferred = self.preferred.lock().ok().and_then(|p| *p);
        preferred.and_then(|i| self.relays.get(i)).map(|r| r.name.clone())
    }

    /// Issue one request after waiting for the global rate limiter.
    pub async fn rate_limited_fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        self.limiter.acquire().await;
        debug!(url = %request.url, "Fetching");
        self.fetcher.fetch(request).await
    }

    /// Issue one request to a local service without throttling or relays.
    pub async fn local_fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        debug!(url = %request.url, "Fetching local");
        self.fetcher.fetch(request).await
    }

    /// Relay indices in attempt order: the sticky relay first, then the rest.
    fn relay_order(&self) -> Vec<usize> {
        let preferred = self.preferred.lock().ok().and_then(|p| *p);
        let mut order: Vec<usize> = Vec::with_capacity(self.relays.len());
        if let Some(p) = preferred.filter(|p| *p < self.relays.len()) {
            order.push(p);
        }
        order.extend((0..self.relays.len()).filter(|i| Some(*i) != preferred));
        order
    }

    fn remember(&self, index: usize) {
        if let Ok(mut preferred) = self.preferred.lock() {
            *preferred = Some(index);
        }
    }

    /// Fetch `request.url` through the relay chain.
    ///
    /// Each relay gets up to `max_retries_per_relay` attempts with exponential
    /// backoff. A 429 abandons the relay immediately, as does any other 4xx.
    /// The relay that succeeds becomes the first one tried next time.
    #[instrument(skip(self, request), fields(url = %request.url))]
    pub async fn fetch_with_relay_fallback(
        &self,
        request: &FetchRequest,
        max_retries_per_relay: Option<u32>,
    ) -> Result<FetchResponse> {
        let max_attempts = max_retries_per_relay
            .unwrap_or(self.max_retries_per_relay)
            .max(1);
        let mut last_error = String::from("no relays configured");

        for index in self.relay_order() {
            let relay = &self.relays[index];
            let relayed = request.retarget(relay.wrap(&request.url));

            for attempt in 0..max_attempts {
                match self.rate_limited_fetch(&relayed).await {
                    Ok(response) if response.is_success() => {
                        if attempt > 0 || index != 0 {
                            info!(relay = %relay.name, attempt = attempt + 1, "Relay succeeded");
                        }
                        self.remember(index);
                        return Ok(response);
                    }
                    Ok(response) if response.is_rate_limited() => {
                        warn!(relay = %relay.name, "Relay rate limited (429), moving on");
                        last_error = format!("{}: HTTP 429", relay.name);
                        break;
                    }
                    Ok(response) if (400..500).contains(&response.status) => {
                        warn!(relay = %relay.name, status = response.status, "Relay rejected request");
                        last_error = format!("{}: HTTP {}", relay.name, response.status);
                        break;
                    }
                    Ok(response) => {
                        last_error = format!("{}: HTTP {}", relay.name, response.status);
                    }
                    Err(e) => {
                        last_error = format!("{}: {}", relay.name, e);
                    }
                }

                if attempt + 1 < max_attempts {
                    let backoff = backoff_for(self.base_backoff, attempt);
                    warn!(
                        relay = %relay.name,
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %last_error,
                        "Relay attempt failed, retrying after backoff"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        Err(HarvestError::Transport(format!(
            "All {} relays exhausted for {}: {}",
            self.relays.len(),
            request.url,
            last_error
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::{ok, status, ScriptedFetcher};

    fn transport(fetcher: Arc<ScriptedFetcher>) -> Transport {
        Transport::new(fetcher, Duration::ZERO)
            .with_relays(vec![
                RelayConfig::prefix("relay-one", "https://one.example/"),
                RelayConfig::prefix("relay-two", "https://two.example/"),
            ])
            .with_backoff(Duration::ZERO)
    }

    #[test]
    fn test_wrap() {
        let target = "https://host.example/watch?v=a&b=c";
        assert_eq!(RelayConfig::direct().wrap(target), target);
        assert_eq!(
            RelayConfig::prefix("p", "https://p.example/").wrap(target),
            "https://p.example/https://host.example/watch?v=a&b=c"
        );
        assert_eq!(
            RelayConfig::query("q", "https://q.example/raw?url=").wrap(target),
            "https://q.example/raw?url=https%3A%2F%2Fhost.example%2Fwatch%3Fv%3Da%26b%3Dc"
        );
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let base = Duration::from_secs(1);
        assert_eq!(backoff_for(base, 0), Duration::from_secs(1));
        assert_eq!(backoff_for(base, 2), Duration::from_secs(4));
        assert_eq!(backoff_for(base, 6), MAX_BACKOFF);
        // Large retry counts from config must not overflow.
        assert_eq!(backoff_for(base, 40), MAX_BACKOFF);
        assert_eq!(backoff_for(Duration::ZERO, 40), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_429_skips_relay_and_sticks_to_winner() {
        let fetcher = Arc::new(ScriptedFetcher::new(|req| {
            if req.url.starts_with("https://one.example/") {
                status(429)
            } else {
                ok("from two")
            }
        }));
        let transport = transport(fetcher.clone());
        let request = FetchRequest::get("https://host.example/page");

        let response = transport.fetch_with_relay_fallback(&request, None).await.unwrap();
        assert_eq!(response.body, "from two");
        // 429 is not retried on the same relay.
        assert_eq!(fetcher.count_matching("one.example"), 1);
        assert_eq!(transport.preferred_relay().as_deref(), Some("relay-two"));

        transport.fetch_with_relay_fallback(&request, None).await.unwrap();
        let calls = fetcher.calls();
        assert!(calls[2].starts_with("https://two.example/"));
        assert_eq!(calls.len(), 3);
    }

    #[tokio::test]
    async fn test_server_errors_retry_then_exhaust() {
        let fetcher = Arc::new(ScriptedFetcher::new(|_| status(503)));
        let transport = transport(fetcher.clone());

        let result = transport
            .fetch_with_relay_fallback(&FetchRequest::get("https://host.example/x"), Some(2))
            .await;

        assert!(matches!(result, Err(HarvestError::Transport(_))));
        assert_eq!(fetcher.count_matching("one.example"), 2);
        assert_eq!(fetcher.count_matching("two.example"), 2);
        assert_eq!(transport.preferred_relay(), None);
    }

    #[tokio::test]
    async fn test_transient_error_recovers_on_same_relay() {
        let attempts = Arc::new(Mutex::new(0u32));
        let counter = attempts.clone();
        let fetcher = Arc::new(ScriptedFetcher::new(move |_| {
            let mut n = counter.lock().unwrap();
            *n += 1;
            if *n == 1 {
                Err(HarvestError::Transport("connection reset".into()))
            } else {
                ok("recovered")
            }
        }));
        let transport = transport(fetcher.clone());

        let response = transport
            .fetch_with_relay_fallback(&FetchRequest::get("https://host.example/y"), None)
            .await
            .unwrap();
        assert_eq!(response.body, "recovered");
        assert_eq!(fetcher.count_matching("one.example"), 2);
        assert_eq!(fetcher.count_matching("two.example"), 0);
    }
}
