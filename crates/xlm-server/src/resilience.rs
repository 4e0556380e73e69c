//! Resilience patterns guarding the HTTP surface against a struggling
//! downstream (the database, or a runaway ingest): a circuit breaker and a
//! token-bucket rate limiter. The circuit breaker is adapted directly from a
//! connector-resilience module found elsewhere in this engine's lineage;
//! the rate limiter has no equivalent precedent there and is written in the
//! same atomics-and-`Instant` idiom.

use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Closed,
            1 => Self::Open,
            2 => Self::HalfOpen,
            _ => Self::Closed,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    #[error("circuit breaker is open")]
    Open,
    #[error(transparent)]
    Inner(#[from] E),
}

/// Closed (normal) -> Open (rejecting) -> HalfOpen (probing) -> Closed.
/// Guards calls into the pipeline orchestrator so a string of downstream
/// failures (e.g. the database is down) fails fast instead of piling up
/// timeouts behind it (spec §6: "Circuit-breaker open -> 503").
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Arc<AtomicU8>,
    failure_count: Arc<AtomicU32>,
    success_count: Arc<AtomicU32>,
    threshold: u32,
    half_open_max_calls: u32,
    timeout: Duration,
    last_failure_time: Arc<RwLock<Option<Instant>>>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, timeout: Duration) -> Self {
        Self {
            state: Arc::new(AtomicU8::new(CircuitState::Closed as u8)),
            failure_count: Arc::new(AtomicU32::new(0)),
            success_count: Arc::new(AtomicU32::new(0)),
            threshold,
            half_open_max_calls: 3,
            timeout,
            last_failure_time: Arc::new(RwLock::new(None)),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state.load(Ordering::Acquire).into()
    }

    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.state() {
            CircuitState::Open => {
                let should_attempt_reset = {
                    let last_failure = self.last_failure_time.read().await;
                    match *last_failure {
                        Some(time) => time.elapsed() >= self.timeout,
                        None => true,
                    }
                };
                if should_attempt_reset {
                    info!("circuit breaker transitioning from open to half-open");
                    self.state.store(CircuitState::HalfOpen as u8, Ordering::Release);
                    self.success_count.store(0, Ordering::Release);
                } else {
                    debug!("circuit breaker open, rejecting call");
                    return Err(CircuitBreakerError::Open);
                }
            }
            CircuitState::HalfOpen => {
                if self.success_count.load(Ordering::Acquire) >= self.half_open_max_calls {
                    return Err(CircuitBreakerError::Open);
                }
            }
            CircuitState::Closed => {}
        }

        match f().await {
            Ok(result) => {
                self.on_success().await;
                Ok(result)
            }
            Err(err) => {
                self.on_failure().await;
                Err(CircuitBreakerError::Inner(err))
            }
        }
    }

    async fn on_success(&self) {
        match self.state() {
            CircuitState::HalfOpen => {
                let successes = self.success_count.fetch_add(1, Ordering::AcqRel) + 1;
                if successes >= self.half_open_max_calls {
                    info!("circuit breaker transitioning from half-open to closed");
                    self.reset().await;
                }
            }
            CircuitState::Closed => {
                self.failure_count.store(0, Ordering::Release);
            }
            CircuitState::Open => {}
        }
    }

    async fn on_failure(&self) {
        let failures = self.failure_count.fetch_add(1, Ordering::AcqRel) + 1;
        match self.state() {
            CircuitState::Closed => {
                if failures >= self.threshold {
                    warn!(failures, threshold = self.threshold, "circuit breaker opening");
                    self.trip().await;
                }
            }
            CircuitState::HalfOpen => {
                warn!("circuit breaker probe failed, reopening");
                self.trip().await;
            }
            CircuitState::Open => {}
        }
    }

    async fn trip(&self) {
        self.state.store(CircuitState::Open as u8, Ordering::Release);
        *self.last_failure_time.write().await = Some(Instant::now());
    }

    async fn reset(&self) {
        self.state.store(CircuitState::Closed as u8, Ordering::Release);
        self.failure_count.store(0, Ordering::Release);
        self.success_count.store(0, Ordering::Release);
        *self.last_failure_time.write().await = None;
    }
}

/// Token-bucket rate limiter: `capacity` tokens, refilled at `refill_per_sec`
/// per second. Guards the job-creation endpoints (upload, multisheet start)
/// against a burst of requests each starting an expensive ingest.
pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    bucket: Mutex<(f64, Instant)>,
}

impl RateLimiter {
    pub fn new(capacity: u32, refill_per_sec: u32) -> Self {
        Self {
            capacity: capacity as f64,
            refill_per_sec: refill_per_sec as f64,
            bucket: Mutex::new((capacity as f64, Instant::now())),
        }
    }

    /// Attempts to take one token; `false` means the caller should be
    /// rejected (429).
    pub async fn try_acquire(&self) -> bool {
        let mut guard = self.bucket.lock().await;
        let (tokens, last) = &mut *guard;
        let now = Instant::now();
        let elapsed = now.duration_since(*last).as_secs_f64();
        *tokens = (*tokens + elapsed * self.refill_per_sec).min(self.capacity);
        *last = now;

        if *tokens >= 1.0 {
            *tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn circuit_breaker_opens_after_threshold_failures() {
        let cb = CircuitBreaker::new(3, Duration::from_secs(1));
        for _ in 0..3 {
            let _ = cb.call(|| async { Err::<(), _>(std::io::Error::new(std::io::ErrorKind::Other, "boom")) }).await;
        }
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn circuit_breaker_recovers_through_half_open() {
        let cb = CircuitBreaker::new(1, Duration::from_millis(20));
        let _ = cb.call(|| async { Err::<(), _>(std::io::Error::new(std::io::ErrorKind::Other, "boom")) }).await;
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(40)).await;
        for _ in 0..3 {
            let _ = cb.call(|| async { Ok::<_, std::io::Error>(()) }).await;
        }
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn rate_limiter_rejects_once_capacity_is_spent() {
        let limiter = RateLimiter::new(2, 1);
        assert!(limiter.try_acquire().await);
        assert!(limiter.try_acquire().await);
        assert!(!limiter.try_acquire().await);
    }
}
