use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use custody_types::Timestamp;

/// Source of ledger timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Hand-driven clock for deterministic tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    secs: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            secs: AtomicU64::new(start.as_secs()),
        }
    }

    pub fn set(&self, to: Timestamp) {
        self.secs.store(to.as_secs(), Ordering::SeqCst);
    }

    /// Move the clock forward by `secs` and return the new time.
    pub fn advance(&self, secs: u64) -> Timestamp {
        let prev = self.secs.fetch_add(secs, Ordering::SeqCst);
        Timestamp::from_secs(prev.saturating_add(secs))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_secs(self.secs.load(Ordering::SeqCst))
    }
}

/// Wraps any clock so that successive readings never go backwards.
///
/// If the wrapped clock steps back (NTP adjustment, a restored snapshot with
/// newer events than the host clock), the last issued value is repeated until
/// the source catches up.
pub struct MonotonicClock {
    source: Arc<dyn Clock>,
    last: AtomicU64,
}

impl MonotonicClock {
    pub fn new(source: Arc<dyn Clock>) -> Self {
        Self {
            source,
            last: AtomicU64::new(0),
        }
    }

    /// Guarantee that no later reading is below `floor`.
    pub fn raise_floor(&self, floor: Timestamp) {
        self.last.fetch_max(floor.as_secs(), Ordering::SeqCst);
    }

    /// Highest value issued or set as floor so far.
    pub fn last(&self) -> Timestamp {
        Timestamp::from_secs(self.last.load(Ordering::SeqCst))
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Timestamp {
        let reading = self.source.now().as_secs();
        let prev = self.last.fetch_max(reading, Ordering::SeqCst);
        Timestamp::from_secs(prev.max(reading))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_is_driven_by_hand() {
        let clock = ManualClock::new(Timestamp::from_secs(100));
        assert_eq!(clock.now(), Timestamp::from_secs(100));
        assert_eq!(clock.advance(5), Timestamp::from_secs(105));
        clock.set(Timestamp::from_secs(7));
        assert_eq!(clock.now(), Timestamp::from_secs(7));
    }

    #[test]
    fn monotonic_clock_never_goes_back() {
        let source = Arc::new(ManualClock::new(Timestamp::from_secs(100)));
        let clock = MonotonicClock::new(source.clone());

        assert_eq!(clock.now(), Timestamp::from_secs(100));
        source.set(Timestamp::from_secs(50));
        assert_eq!(clock.now(), Timestamp::from_secs(100));
        source.set(Timestamp::from_secs(120));
        assert_eq!(clock.now(), Timestamp::from_secs(120));
    }

    #[test]
    fn floor_holds_back_stale_source() {
        let source = Arc::new(ManualClock::new(Timestamp::from_secs(10)));
        let clock = MonotonicClock::new(source);
        clock.raise_floor(Timestamp::from_secs(500));
        assert_eq!(clock.now(), Timestamp::from_secs(500));
        assert_eq!(clock.last(), Timestamp::from_secs(500));

        // A lower floor is ignored.
        clock.raise_floor(Timestamp::from_secs(1));
        assert_eq!(clock.last(), Timestamp::from_secs(500));
    }

    #[test]
    fn concurrent_readings_are_non_decreasing_per_thread() {
        use std::thread;

        let clock = Arc::new(MonotonicClock::new(Arc::new(SystemClock)));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let clock = Arc::clone(&clock);
                thread::spawn(move || {
                    let mut prev = clock.now();
                    for _ in 0..500 {
                        let next = clock.now();
                        assert!(next >= prev);
                        prev = next;
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
