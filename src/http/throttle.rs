//! Request pacing: a requests-per-second spacer plus a resizable concurrency cap.

use parking_lot::Mutex as SyncMutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{AcquireError, Mutex, OwnedSemaphorePermit, Semaphore};

#[derive(Clone)]
pub struct RateLimiter {
    interval: Duration,
    last_request: Arc<Mutex<Instant>>,
}

impl RateLimiter {
    /// rate = requests per second, 0 disables spacing
    pub fn new(rate: u32) -> Self {
        let interval = if rate == 0 {
            Duration::from_secs(0)
        } else {
            Duration::from_secs_f64(1.0 / rate as f64)
        };

        let start = Instant::now().checked_sub(interval).unwrap_or_else(Instant::now);

        Self {
            interval,
            last_request: Arc::new(Mutex::new(start)),
        }
    }

    pub async fn wait(&self) {
        if self.interval.is_zero() {
            return;
        }

        let mut last = self.last_request.lock().await;
        let elapsed = last.elapsed();

        if elapsed < self.interval {
            tokio::time::sleep(self.interval - elapsed).await;
        }

        *last = Instant::now();
    }
}

/// Concurrency cap whose size can change while requests are in flight.
///
/// Shrinking cannot reclaim permits that are held, so the shortfall is kept as
/// debt and paid by forgetting permits on subsequent acquisitions.
pub struct Throttle {
    semaphore: Arc<Semaphore>,
    limit: SyncMutex<usize>,
    debt: AtomicUsize,
    spacing: RateLimiter,
}

impl Throttle {
    pub fn new(max_concurrency: usize, rate: u32) -> Self {
        let limit = max_concurrency.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit: SyncMutex::new(limit),
            debt: AtomicUsize::new(0),
            spacing: RateLimiter::new(rate),
        }
    }

    pub fn limit(&self) -> usize {
        *self.limit.lock()
    }

    pub fn set_limit(&self, limit: usize) {
        let limit = limit.max(1);
        let mut current = self.limit.lock();

        if limit > *current {
            let mut grow = limit - *current;
            // cancel outstanding debt before handing out new permits
            while grow > 0 && self.take_debt() {
                grow -= 1;
            }
            if grow > 0 {
                self.semaphore.add_permits(grow);
            }
        } else if limit < *current {
            self.debt.fetch_add(*current - limit, Ordering::SeqCst);
        }

        *current = limit;
    }

    /// Waits for pacing and a free slot. The slot is released when the permit drops.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, AcquireError> {
        self.spacing.wait().await;

        loop {
            let permit = self.semaphore.clone().acquire_owned().await?;
            if self.take_debt() {
                permit.forget();
                continue;
            }
            return Ok(permit);
        }
    }

    fn take_debt(&self) -> bool {
        self.debt
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |d| d.checked_sub(1))
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_limit_bounds_permits() {
        let throttle = Throttle::new(2, 0);
        let a = throttle.acquire().await.unwrap();
        let _b = throttle.acquire().await.unwrap();

        let third = tokio::time::timeout(Duration::from_millis(50), throttle.acquire()).await;
        assert!(third.is_err());

        drop(a);
        let third = tokio::time::timeout(Duration::from_millis(50), throttle.acquire()).await;
        assert!(third.is_ok());
    }

    #[tokio::test]
    async fn test_shrink_then_grow() {
        let throttle = Throttle::new(3, 0);
        throttle.set_limit(1);
        assert_eq!(throttle.limit(), 1);

        let only = throttle.acquire().await.unwrap();
        let blocked = tokio::time::timeout(Duration::from_millis(50), throttle.acquire()).await;
        assert!(blocked.is_err());
        drop(only);

        throttle.set_limit(2);
        let _a = throttle.acquire().await.unwrap();
        let _b = throttle.acquire().await.unwrap();
        assert_eq!(throttle.limit(), 2);
    }

    #[test]
    fn test_zero_concurrency_is_clamped() {
        let throttle = Throttle::new(0, 0);
        assert_eq!(throttle.limit(), 1);
    }
}
