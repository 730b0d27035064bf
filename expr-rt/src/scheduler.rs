use std::sync::atomic::{AtomicU64, Ordering};

/// The macro-step cycle counter (§5, §8 property S3/S4): strictly increases
/// between macro-steps, never within one. A `LookupNow` compares its cache
/// entry's `last_cycle` against this to decide whether a fresh interface
/// sample is owed.
#[derive(Debug, Default)]
pub struct Scheduler {
    cycle: AtomicU64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self { cycle: AtomicU64::new(0) }
    }

    pub fn current_cycle(&self) -> u64 {
        self.cycle.load(Ordering::Acquire)
    }

    /// Called once by the plan step loop between macro-steps.
    pub fn increment_cycle(&self) -> u64 {
        self.cycle.fetch_add(1, Ordering::AcqRel) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_count_strictly_increases() {
        let s = Scheduler::new();
        assert_eq!(s.current_cycle(), 0);
        assert_eq!(s.increment_cycle(), 1);
        assert_eq!(s.increment_cycle(), 2);
        assert_eq!(s.current_cycle(), 2);
    }
}
