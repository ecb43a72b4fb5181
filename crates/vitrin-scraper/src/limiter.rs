//! Per-source adaptive rate limiter.
//!
//! One instance exists per upstream source and is never shared between them:
//! each source has its own tolerance for concurrent traffic and its own
//! backoff curve. The limiter composes two controls — a semaphore bounding
//! in-flight calls and an inter-call delay that grows multiplicatively on
//! failure and decays back toward its initial value on success.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};

use vitrin_core::source::{RateProfile, Source};

pub struct AdaptiveRateLimiter {
    profile: RateProfile,
    permits: Semaphore,
    current_delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    successes: AtomicU64,
    failures: AtomicU64,
}

/// Point-in-time observability snapshot.
#[derive(Debug, Clone, Copy)]
pub struct LimiterStats {
    pub current_delay: Duration,
    pub in_flight: usize,
    pub successes: u64,
    pub failures: u64,
}

impl AdaptiveRateLimiter {
    #[must_use]
    pub fn new(profile: RateProfile) -> Self {
        Self {
            profile,
            permits: Semaphore::new(profile.max_concurrency),
            current_delay: Mutex::new(profile.initial_delay),
            in_flight: AtomicUsize::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn for_source(source: Source) -> Self {
        Self::new(source.rate_profile())
    }

    pub async fn stats(&self) -> LimiterStats {
        LimiterStats {
            current_delay: *self.current_delay.lock().await,
            in_flight: self.in_flight.load(Ordering::SeqCst),
            successes: self.successes.load(Ordering::SeqCst),
            failures: self.failures.load(Ordering::SeqCst),
        }
    }

    /// Runs `op` under the limiter: acquire a concurrency slot (waiting if all
    /// are taken), wait out the current delay, invoke, record the outcome, and
    /// propagate the result unchanged.
    ///
    /// A failure multiplies the delay by the profile's backoff multiplier
    /// (capped at `max_delay`); a success divides it by the same factor
    /// (floored at `initial_delay`), so pressure eases gradually rather than
    /// snapping back.
    pub async fn execute<T, E, F, Fut>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        // The semaphore is never closed.
        let _permit = self
            .permits
            .acquire()
            .await
            .expect("limiter semaphore closed");

        let delay = *self.current_delay.lock().await;
        tokio::time::sleep(delay).await;

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let result = op().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut current = self.current_delay.lock().await;
        match &result {
            Ok(_) => {
                self.successes.fetch_add(1, Ordering::SeqCst);
                *current = current
                    .div_f64(self.profile.backoff_multiplier)
                    .max(self.profile.initial_delay);
            }
            Err(_) => {
                self.failures.fetch_add(1, Ordering::SeqCst);
                *current = current
                    .mul_f64(self.profile.backoff_multiplier)
                    .min(self.profile.max_delay);
            }
        }

        result
    }
}
