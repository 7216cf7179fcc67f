use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Fixed-interval limiter shared by every lookup through an `Arc`.
///
/// Callers queue on the mutex, so concurrent extractions are serialized
/// into one request per interval.
#[derive(Debug)]
pub struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval,
        }
    }

    pub fn from_millis(min_interval_ms: u64) -> Self {
        Self::new(Duration::from_millis(min_interval_ms))
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait if necessary to comply with the interval
    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_rate_limiter_creation() {
        let limiter = RateLimiter::from_millis(2000);
        assert_eq!(limiter.min_interval(), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_timing() {
        let limiter = RateLimiter::from_millis(2000);
        let start = Instant::now();

        // First request - no wait
        limiter.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(2000));

        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_limiter_serializes_tasks() {
        let limiter = Arc::new(RateLimiter::from_millis(1000));
        let start = Instant::now();

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move { limiter.wait().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(start.elapsed() >= Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_gap_means_no_wait() {
        let limiter = RateLimiter::from_millis(1000);
        limiter.wait().await;
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let before = Instant::now();
        limiter.wait().await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }
}
