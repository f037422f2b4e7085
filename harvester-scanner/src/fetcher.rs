use crate::error::TransportError;
use crate::rate_limit::RateLimiter;
use crate::result::FetchOutcome;
use reqwest::Client;
use std::future::Future;
use std::time::Duration;
use tracing::{error, info};

pub const DEFAULT_USER_AGENT: &str = "Harvester/0.1 (info-table crawler)";
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_secs(3);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// One raw HTTP exchange. Implementations return the body of a successful
/// response and classify every failure as a [`TransportError`].
pub trait Transport {
    fn get(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;
}

/// Single page request, built fresh for every fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub url: String,
}

impl PageRequest {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.trim().to_string(),
        }
    }
}

/// Knobs shared by the transport and the retry loop.
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub user_agent: String,
    pub request_delay: Duration,
    pub timeout: Duration,
    pub max_attempts: u32,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_delay: DEFAULT_REQUEST_DELAY,
            timeout: DEFAULT_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// `reqwest`-backed transport with a per-attempt timeout.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| TransportError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        Ok(body.to_vec())
    }
}

/// Throttled, retrying page fetcher.
///
/// Every attempt waits on the shared [`RateLimiter`] first. Timeouts are
/// retried until `max_attempts` is spent; any other failure ends the
/// request on the spot.
#[derive(Debug, Clone)]
pub struct Fetcher<T = HttpTransport> {
    transport: T,
    limiter: RateLimiter,
    max_attempts: u32,
}

impl Fetcher<HttpTransport> {
    pub fn from_policy(policy: &FetchPolicy) -> Result<Self, TransportError> {
        let transport = HttpTransport::new(&policy.user_agent, policy.timeout)?;
        Ok(Self::new(
            transport,
            RateLimiter::new(policy.request_delay),
            policy.max_attempts,
        ))
    }
}

impl<T: Transport> Fetcher<T> {
    pub fn new(transport: T, limiter: RateLimiter, max_attempts: u32) -> Self {
        Self {
            transport,
            limiter,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        let request = PageRequest::new(url);
        let mut last_timeout = String::new();

        for attempt in 1..=self.max_attempts {
            self.limiter.throttle().await;

            match self.transport.get(&request.url).await {
                Ok(body) => {
                    info!(url = %request.url, attempt, bytes = body.len(), "Fetched page");
                    return FetchOutcome::Success(body);
                }
                Err(e) if e.is_timeout() => {
                    error!(
                        url = %request.url,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Request timed out"
                    );
                    last_timeout = e.to_string();
                }
                Err(e) => {
                    error!(url = %request.url, attempt, error = %e, "Request failed");
                    return FetchOutcome::PermanentFailure(e.to_string());
                }
            }
        }

        error!(
            url = %request.url,
            attempts = self.max_attempts,
            "Giving up after repeated timeouts"
        );
        FetchOutcome::TransientFailure(last_timeout)
    }
}
