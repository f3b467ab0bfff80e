use std::sync::atomic::{AtomicU64, Ordering};

/// Shared completion counter pumped by workers and read by the control side.
///
/// Increments are relaxed: completions from different workers carry no
/// ordering relationship and the hot path must stay a single uncontended
/// atomic op. Reads are acquire, so a reader observes every increment that is
/// fully ordered before it (in particular, everything counted by a worker
/// that has been joined).
#[derive(Debug, Default)]
pub struct EventCounter(AtomicU64);

impl EventCounter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    #[inline]
    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn concurrent_increments_are_all_attributed() {
        let counter = Arc::new(EventCounter::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let c = Arc::clone(&counter);
            handles.push(std::thread::spawn(move || {
                for _ in 0..10_000 {
                    c.add(3);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.get(), 8 * 10_000 * 3);
    }

    #[test]
    fn reset_returns_to_zero() {
        let counter = EventCounter::new();
        counter.add(42);
        assert_eq!(counter.get(), 42);
        counter.reset();
        assert_eq!(counter.get(), 0);
    }
}
