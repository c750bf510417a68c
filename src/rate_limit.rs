//! Rate limiting for NCBI E-utilities compliance
//!
//! The limiter keeps a log of recent request starts and admits a new start only while
//! fewer than `capacity` starts fall inside the trailing window. Unlike a token bucket,
//! this bounds the number of starts in *every* rolling window, including the ones that
//! straddle a burst.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, instrument, warn};

/// Sliding-window rate limiter shared by every clone
///
/// NCBI E-utilities rate limits:
/// - 3 requests per second without API key
/// - 10 requests per second with API key
/// - Violations can result in IP blocking
#[derive(Clone, Debug)]
pub struct RateLimiter {
    window: Arc<Mutex<StartLog>>,
    rate: f64,
    capacity: usize,
    period: Duration,
}

#[derive(Debug)]
struct StartLog {
    starts: VecDeque<Instant>,
}

impl RateLimiter {
    /// Create a new rate limiter with the specified rate
    ///
    /// A rate of at least one request per second admits `floor(rate)` starts per second.
    /// Slower rates admit a single start per `1 / rate` seconds.
    ///
    /// # Example
    ///
    /// ```
    /// use eutils_retrieval::rate_limit::RateLimiter;
    ///
    /// let limiter = RateLimiter::new(3.0);
    /// assert_eq!(limiter.capacity(), 3);
    ///
    /// let slow = RateLimiter::new(0.5);
    /// assert_eq!(slow.capacity(), 1);
    /// ```
    pub fn new(rate: f64) -> Self {
        let rate = if rate.is_finite() && rate > 0.0 {
            rate
        } else {
            warn!(rate, "Invalid rate limit, falling back to 1 request per second");
            1.0
        };

        let (capacity, period) = if rate >= 1.0 {
            (rate.floor() as usize, Duration::from_secs(1))
        } else {
            (1, Duration::from_secs_f64(1.0 / rate))
        };

        Self {
            window: Arc::new(Mutex::new(StartLog {
                starts: VecDeque::with_capacity(capacity),
            })),
            rate,
            capacity,
            period,
        }
    }

    /// Create rate limiter for NCBI API without API key (3 requests/second)
    pub fn ncbi_default() -> Self {
        Self::new(3.0)
    }

    /// Create rate limiter for NCBI API with API key (10 requests/second)
    pub fn ncbi_with_key() -> Self {
        Self::new(10.0)
    }

    /// Wait for a free slot in the window and record the start
    ///
    /// Every caller sharing this limiter (through clones) competes for the same slots.
    ///
    /// ```no_run
    /// use eutils_retrieval::rate_limit::RateLimiter;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let limiter = RateLimiter::ncbi_default();
    ///
    ///     limiter.acquire().await;
    ///     // Make API call here
    /// }
    /// ```
    #[instrument(skip(self))]
    pub async fn acquire(&self) {
        loop {
            let wake_at = {
                let mut log = self.window.lock().await;
                let now = Instant::now();
                log.evict(now, self.period);

                if log.starts.len() < self.capacity {
                    log.starts.push_back(now);
                    debug!(
                        in_window = log.starts.len(),
                        capacity = self.capacity,
                        "Rate limit slot acquired"
                    );
                    return;
                }

                // The oldest start leaves the window first
                match log.starts.front() {
                    Some(oldest) => *oldest + self.period,
                    None => now,
                }
            };

            debug!(
                wait_ms = wake_at
                    .saturating_duration_since(Instant::now())
                    .as_millis() as u64,
                "Waiting for rate limit window"
            );
            sleep_until(wake_at).await;
        }
    }

    /// Check if a slot is available without blocking
    ///
    /// Does not record a start.
    pub async fn check_available(&self) -> bool {
        let mut log = self.window.lock().await;
        log.evict(Instant::now(), self.period);
        log.starts.len() < self.capacity
    }

    /// Number of starts inside the current window (for testing and monitoring)
    pub async fn in_window(&self) -> usize {
        let mut log = self.window.lock().await;
        log.evict(Instant::now(), self.period);
        log.starts.len()
    }

    /// Get the configured rate limit (requests per second)
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Maximum starts admitted per window
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Length of the rolling window
    pub fn period(&self) -> Duration {
        self.period
    }
}

impl StartLog {
    fn evict(&mut self, now: Instant, period: Duration) {
        while let Some(oldest) = self.starts.front() {
            if now.duration_since(*oldest) >= period {
                self.starts.pop_front();
            } else {
                break;
            }
        }
    }
}
