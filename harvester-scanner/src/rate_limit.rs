use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Global spacing between outgoing requests.
///
/// Clones share the same "time of last request", so any number of callers
/// holding a clone are throttled together. The lock is held across the
/// sleep, which serializes waiters and keeps the spacing exact.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    /// Wait until the next request may start, then claim that slot.
    ///
    /// The first request of the process also waits a full interval.
    pub async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        let now = Instant::now();
        let ready_at = match *last {
            Some(previous) => previous + self.interval,
            None => now + self.interval,
        };
        if ready_at > now {
            tokio::time::sleep_until(ready_at).await;
        }
        *last = Some(Instant::now());
    }
}
