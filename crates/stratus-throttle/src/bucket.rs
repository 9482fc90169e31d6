//! Token bucket with adjustable refill rate
//!
//! Classic token bucket over fractional tokens: a bucket of `burst` capacity
//! refills continuously at `rate` tokens per second, where one token is one
//! byte. The bucket starts full so a stream's first burst goes out
//! immediately. The refill rate can be retargeted mid-stream, which is how
//! dynamic adaptation takes effect without draining accumulated tokens.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::WriteError;

#[derive(Debug)]
struct BucketInner {
    tokens: f64,
    last_refill: Instant,
}

/// Byte-granular token bucket, safe for concurrent acquisition
#[derive(Debug)]
pub struct TokenBucket {
    /// Refill rate in bytes per second; adjustable at runtime
    rate: Mutex<f64>,
    /// Maximum accumulated tokens
    burst: u64,
    inner: Mutex<BucketInner>,
}

impl TokenBucket {
    /// Creates a bucket refilling at `rate` bytes/sec with `burst` capacity.
    ///
    /// The bucket starts full.
    pub fn new(rate: u64, burst: u64) -> Self {
        Self {
            rate: Mutex::new(rate as f64),
            burst: burst.max(1),
            inner: Mutex::new(BucketInner {
                tokens: burst.max(1) as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    fn refill(&self, inner: &mut BucketInner) {
        let now = Instant::now();
        let elapsed = now.duration_since(inner.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            let rate = *self.rate.lock().unwrap();
            inner.tokens = (inner.tokens + elapsed * rate).min(self.burst as f64);
            inner.last_refill = now;
        }
    }

    /// Attempts to take `n` tokens; never blocks.
    pub fn try_acquire(&self, n: u64) -> bool {
        let n = n.min(self.burst) as f64;
        let mut inner = self.inner.lock().unwrap();
        self.refill(&mut inner);
        if inner.tokens >= n {
            inner.tokens -= n;
            true
        } else {
            false
        }
    }

    /// Seconds until `n` tokens will have accumulated; 0.0 if available now.
    pub fn time_until(&self, n: u64) -> f64 {
        let n = n.min(self.burst) as f64;
        let mut inner = self.inner.lock().unwrap();
        self.refill(&mut inner);
        if inner.tokens >= n {
            return 0.0;
        }
        let rate = *self.rate.lock().unwrap();
        if rate <= 0.0 {
            return f64::MAX;
        }
        (n - inner.tokens) / rate
    }

    /// Waits until `n` tokens are available, then takes them.
    ///
    /// Requests above the burst size are clamped to it; the writer slices
    /// its data so this only happens for degenerate configurations. The wait
    /// aborts with [`WriteError::Cancelled`] as soon as `cancel` fires.
    pub async fn wait_n(&self, n: u64, cancel: &CancellationToken) -> Result<(), WriteError> {
        loop {
            if cancel.is_cancelled() {
                return Err(WriteError::Cancelled);
            }
            if self.try_acquire(n) {
                return Ok(());
            }

            let wait = Duration::from_secs_f64(self.time_until(n).clamp(0.001, 1.0));
            tokio::select! {
                _ = cancel.cancelled() => return Err(WriteError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    pub fn rate(&self) -> u64 {
        *self.rate.lock().unwrap() as u64
    }

    /// Retargets the refill rate; accumulated tokens are kept.
    pub fn set_rate(&self, rate: u64) {
        // Settle the balance at the old rate before switching.
        let mut inner = self.inner.lock().unwrap();
        self.refill(&mut inner);
        *self.rate.lock().unwrap() = rate as f64;
    }

    pub fn burst(&self) -> u64 {
        self.burst
    }

    /// Currently accumulated tokens (after refill).
    pub fn available(&self) -> f64 {
        let mut inner = self.inner.lock().unwrap();
        self.refill(&mut inner);
        inner.tokens
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_bucket_starts_full() {
        let bucket = TokenBucket::new(1000, 500);
        assert!(bucket.try_acquire(500));
        assert!(!bucket.try_acquire(1));
    }

    #[test]
    fn test_refill_over_time() {
        let bucket = TokenBucket::new(100_000, 1000);
        assert!(bucket.try_acquire(1000));
        assert!(!bucket.try_acquire(1000));

        // 100k tokens/sec -> 1000 tokens in 10ms
        std::thread::sleep(Duration::from_millis(20));
        assert!(bucket.try_acquire(1000));
    }

    #[test]
    fn test_refill_caps_at_burst() {
        let bucket = TokenBucket::new(1_000_000, 100);
        std::thread::sleep(Duration::from_millis(20));
        assert!(bucket.available() <= 100.0 + f64::EPSILON);
    }

    #[test]
    fn test_time_until() {
        let bucket = TokenBucket::new(1000, 1000);
        assert_eq!(bucket.time_until(500), 0.0);

        bucket.try_acquire(1000);
        let wait = bucket.time_until(1000);
        assert!(wait > 0.5 && wait <= 1.1, "wait was {wait}");
    }

    #[test]
    fn test_set_rate_changes_refill() {
        let bucket = TokenBucket::new(10, 100);
        bucket.try_acquire(100);
        bucket.set_rate(100_000);
        assert_eq!(bucket.rate(), 100_000);
        std::thread::sleep(Duration::from_millis(10));
        assert!(bucket.try_acquire(100));
    }

    #[tokio::test]
    async fn test_wait_n_acquires_after_refill() {
        let bucket = TokenBucket::new(100_000, 1000);
        let cancel = CancellationToken::new();
        bucket.try_acquire(1000);

        let start = Instant::now();
        bucket.wait_n(1000, &cancel).await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_wait_n_cancellation_releases_quickly() {
        // refill is effectively frozen, so only cancellation can end the wait
        let bucket = Arc::new(TokenBucket::new(1, 1000));
        bucket.try_acquire(1000);
        let cancel = CancellationToken::new();

        let waiter = {
            let bucket = Arc::clone(&bucket);
            let cancel = cancel.clone();
            tokio::spawn(async move { bucket.wait_n(1000, &cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("cancellation did not release the waiter")
            .unwrap();
        assert!(matches!(result, Err(WriteError::Cancelled)));
    }

    #[test]
    fn test_concurrent_acquire_never_overdraws() {
        let bucket = Arc::new(TokenBucket::new(0, 1000));
        let mut handles = Vec::new();
        for _ in 0..20 {
            let bucket = Arc::clone(&bucket);
            handles.push(std::thread::spawn(move || {
                u64::from(bucket.try_acquire(100))
            }));
        }
        let acquired: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert!(acquired <= 10, "acquired {acquired} x 100 tokens from 1000");
    }
}
