//! Sliding-window rate limiting
//!
//! Per-client timestamp buckets trimmed on every check. Buckets empty out
//! naturally as their window passes; a background sweeper evicts the empty
//! entries so the map does not grow with the set of clients ever seen.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::ApiError;
use crate::middleware::client_key;
use crate::state::AppState;

/// How often sweepers run
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Paths exempt from the general limiter
const BYPASS_PATHS: [&str; 2] = ["/health", "/metrics"];

/// The one route the MFA limiter guards
const MFA_VERIFY_PATH: &str = "/auth/mfa/verify";

/// Sliding-window limiter over per-client timestamp buckets
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    max_requests: usize,
    window: Duration,
    buckets: Mutex<HashMap<String, Vec<Instant>>>,
}

impl SlidingWindowLimiter {
    /// Create a limiter allowing `max_requests` per `window`
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Admit or reject one request for the given client key
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut buckets = self.buckets.lock();
        let bucket = buckets.entry(key.to_string()).or_default();

        bucket.retain(|&at| now.duration_since(at) < self.window);

        if bucket.len() >= self.max_requests {
            return false;
        }
        bucket.push(now);
        true
    }

    /// Seconds a rejected client should wait before retrying
    pub fn retry_after(&self) -> u32 {
        self.window.as_secs() as u32
    }

    /// Requests currently counted for a client
    pub fn request_count(&self, key: &str) -> usize {
        let now = Instant::now();
        let mut buckets = self.buckets.lock();
        match buckets.get_mut(key) {
            Some(bucket) => {
                bucket.retain(|&at| now.duration_since(at) < self.window);
                bucket.len()
            }
            None => 0,
        }
    }

    /// Number of tracked clients
    pub fn client_count(&self) -> usize {
        self.buckets.lock().len()
    }
}

/// Periodic maintenance a sweeper can drive
pub trait Sweep: Send + Sync {
    /// Evict expired state, returning how many entries were dropped
    fn sweep(&self) -> usize;
}

impl Sweep for SlidingWindowLimiter {
    fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut buckets = self.buckets.lock();
        let before = buckets.len();
        buckets.retain(|_, bucket| {
            bucket.retain(|&at| now.duration_since(at) < self.window);
            !bucket.is_empty()
        });
        before - buckets.len()
    }
}

/// Handle to a running background sweeper
///
/// Dropping the handle abandons the task; call [`SweeperHandle::stop`] to
/// join it cleanly (tests and graceful shutdown).
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the sweeper and wait for it to exit
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}

/// Start a sweeper over any [`Sweep`] target
pub fn start_sweeper(
    name: &'static str,
    target: Arc<dyn Sweep>,
    interval: Duration,
) -> SweeperHandle {
    let (shutdown, mut shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let evicted = target.sweep();
                    if evicted > 0 {
                        tracing::debug!(sweeper = name, evicted, "evicted expired entries");
                    }
                }
                _ = shutdown_rx.changed() => break,
            }
        }
    });
    SweeperHandle { shutdown, handle }
}

/// General limiter, applied to every route except health and metrics
pub async fn general_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if BYPASS_PATHS.contains(&path) {
        return next.run(request).await;
    }

    let key = client_key(&request);
    if !state.limiter.check(&key) {
        tracing::warn!(client = %key, path = %path, "rate limit exceeded");
        return ApiError::rate_limited("rate_limit_exceeded", state.limiter.retry_after())
            .into_response();
    }

    next.run(request).await
}

/// MFA limiter, step 4 of the admission chain
///
/// Sits in the global stack right after the general limiter - ahead of
/// CORS, security headers, CSRF and identity population - but acts only on
/// the TOTP-verification route. Brute-force attempts are counted and
/// rejected before any later layer can short-circuit the request.
pub async fn mfa_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if request.uri().path() != MFA_VERIFY_PATH {
        return next.run(request).await;
    }

    let key = client_key(&request);
    if !state.mfa_limiter.check(&key) {
        tracing::warn!(client = %key, "MFA verification rate limit exceeded");
        return ApiError::rate_limited("mfa_rate_limit", state.mfa_limiter.retry_after())
            .into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_up_to_limit() {
        let limiter = SlidingWindowLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.1"));
        assert!(!limiter.check("10.0.0.1"));
    }

    #[test]
    fn test_rejection_is_exactly_the_over_limit_request() {
        let limiter = SlidingWindowLimiter::new(5, Duration::from_secs(60));
        let admitted = (0..6).filter(|_| limiter.check("c")).count();
        assert_eq!(admitted, 5);
    }

    #[test]
    fn test_window_slides() {
        let limiter = SlidingWindowLimiter::new(2, Duration::from_millis(50));
        assert!(limiter.check("c"));
        assert!(limiter.check("c"));
        assert!(!limiter.check("c"));

        std::thread::sleep(Duration::from_millis(80));
        assert!(limiter.check("c"));
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = SlidingWindowLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("a"));
        assert!(limiter.check("b"));
        assert!(!limiter.check("a"));
        assert!(!limiter.check("b"));
    }

    #[test]
    fn test_sweep_evicts_empty_buckets() {
        let limiter = SlidingWindowLimiter::new(5, Duration::from_millis(10));
        limiter.check("a");
        limiter.check("b");
        assert_eq!(limiter.client_count(), 2);

        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(limiter.sweep(), 2);
        assert_eq!(limiter.client_count(), 0);
    }

    #[tokio::test]
    async fn test_sweeper_stops_cleanly() {
        let limiter = Arc::new(SlidingWindowLimiter::new(5, Duration::from_secs(60)));
        let handle = start_sweeper("test", limiter, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.stop().await;
    }
}
