//! Per-instance mtime accuracy estimator.
//!
//! Scoped to one `FileSystemInfo` rather than the process, a deliberate
//! redesign from the source's process-global estimator so tests don't leak
//! state into each other.

use std::sync::atomic::{AtomicI64, Ordering};

const LEVELS: [i64; 5] = [1, 10, 100, 1000, 2000];

pub struct AccuracyEstimator(AtomicI64);

impl AccuracyEstimator {
    pub fn new() -> Self {
        Self(AtomicI64::new(2000))
    }

    pub fn current(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }

    /// Tighten the estimate for one observed nonzero mtime. Never loosens it;
    /// concurrent observers race via compare-exchange, not a lock.
    pub fn observe(&self, mtime: i64) {
        loop {
            let current = self.0.load(Ordering::SeqCst);
            let next = Self::tighten(current, mtime);
            if next == current {
                return;
            }
            if self
                .0
                .compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                tracing::debug!(mtime, accuracy_ms = next, "tightened mtime accuracy estimate");
                return;
            }
        }
    }

    fn tighten(accuracy: i64, mtime: i64) -> i64 {
        if accuracy > 1 && mtime % 2 != 0 {
            1
        } else if accuracy > 10 && mtime % 20 != 0 {
            10
        } else if accuracy > 100 && mtime % 200 != 0 {
            100
        } else if accuracy > 1000 && mtime % 2000 != 0 {
            1000
        } else {
            accuracy
        }
    }
}

impl Default for AccuracyEstimator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_the_loosest_level() {
        assert_eq!(AccuracyEstimator::new().current(), 2000);
    }

    #[test]
    fn tightens_monotonically_and_stays_in_the_level_set() {
        let estimator = AccuracyEstimator::new();
        let mtimes = [4000i64, 4020, 4021, 4200, 4210];
        let mut previous = estimator.current();
        for mtime in mtimes {
            estimator.observe(mtime);
            let current = estimator.current();
            assert!(current <= previous);
            assert!(LEVELS.contains(&current));
            previous = current;
        }
    }

    #[test]
    fn odd_mtime_tightens_straight_to_one_millisecond() {
        let estimator = AccuracyEstimator::new();
        estimator.observe(4001);
        assert_eq!(estimator.current(), 1);
    }

    proptest::proptest! {
        #[test]
        fn never_loosens_across_any_observation_sequence(mtimes: Vec<i64>) {
            let estimator = AccuracyEstimator::new();
            let mut previous = estimator.current();
            for mtime in mtimes {
                estimator.observe(mtime);
                let current = estimator.current();
                prop_assert!(current <= previous);
                prop_assert!(LEVELS.contains(&current));
                previous = current;
            }
        }
    }
}
