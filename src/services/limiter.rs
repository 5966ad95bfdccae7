//! Admission control for outgoing requests.
//!
//! Two independent limits compose here: a semaphore bounds how many requests
//! are in flight, and a GCRA limiter spaces request starts. A request takes its
//! concurrency permit first and its rate slot second, so no start can be
//! bunched up behind a permit wait.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use tokio::sync::{Semaphore, SemaphorePermit};

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Process-wide gate every request passes before it starts.
pub struct RequestGate {
    permits: Arc<Semaphore>,
    spacing: Option<DirectLimiter>,
    interval: Duration,
    admitted: AtomicU64,
}

impl RequestGate {
    /// `interval` of zero disables spacing.
    pub fn new(max_concurrent: usize, interval: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            spacing: Quota::with_period(interval).map(RateLimiter::direct),
            interval,
            admitted: AtomicU64::new(0),
        }
    }

    /// Wait for a free slot and the next start time.
    ///
    /// Returns `None` once the gate has been closed. The request may run while
    /// the returned permit is held.
    pub async fn admit(&self) -> Option<SemaphorePermit<'_>> {
        let permit = self.permits.acquire().await.ok()?;
        if let Some(limiter) = &self.spacing {
            limiter.until_ready().await;
        }
        self.admitted.fetch_add(1, Ordering::Relaxed);
        Some(permit)
    }

    /// Refuse all further admissions; waiters are released with `None`.
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    /// Requests admitted so far.
    pub fn admitted(&self) -> u64 {
        self.admitted.load(Ordering::Relaxed)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Permits not currently held.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[tokio::test]
    async fn test_spacing_is_enforced() {
        let gate = RequestGate::new(10, Duration::from_millis(30));
        let start = Instant::now();
        for _ in 0..5 {
            let _permit = gate.admit().await.unwrap();
        }
        // First admission is immediate, the next four wait one interval each.
        assert!(start.elapsed() >= Duration::from_millis(110));
        assert_eq!(gate.admitted(), 5);
    }

    #[tokio::test]
    async fn test_zero_interval_disables_spacing() {
        let gate = RequestGate::new(2, Duration::ZERO);
        let start = Instant::now();
        for _ in 0..50 {
            let _permit = gate.admit().await.unwrap();
        }
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_permits_bound_in_flight() {
        let gate = RequestGate::new(2, Duration::ZERO);
        let a = gate.admit().await.unwrap();
        let _b = gate.admit().await.unwrap();
        assert_eq!(gate.available(), 0);

        let blocked = tokio::time::timeout(Duration::from_millis(50), gate.admit()).await;
        assert!(blocked.is_err());

        drop(a);
        assert!(gate.admit().await.is_some());
    }

    #[tokio::test]
    async fn test_closed_gate_refuses() {
        let gate = RequestGate::new(1, Duration::ZERO);
        gate.close();
        assert!(gate.is_closed());
        assert!(gate.admit().await.is_none());
    }
}
