//! Request counter shared by every service.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic count of service-method invocations.
///
/// Create one at startup and hand the same `Arc<RequestCounter>` to every
/// service; each public service method increments it once.
///
/// ```
/// use sun_cache::RequestCounter;
///
/// let counter = RequestCounter::new();
/// counter.increment();
/// counter.increment();
/// assert_eq!(counter.value(), 2);
///
/// counter.reset();
/// assert_eq!(counter.value(), 0);
/// ```
#[derive(Debug, Default)]
pub struct RequestCounter {
    count: AtomicU64,
}

impl RequestCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request. Returns the new total.
    pub fn increment(&self) -> u64 {
        self.count.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn value(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.count.store(0, Ordering::SeqCst);
        debug!("Request counter reset");
    }
}
