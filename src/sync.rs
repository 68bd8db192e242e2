// src/sync.rs
//
// SYNC coordinator (spec.md Section 4.9). Owns only the modular
// counter; `Node` calls `on_sync` on SYNC frame reception (or producer
// tick) and then walks its TPDO/RPDO arrays using the result.

/// Result of one SYNC event: the new counter value and whether this
/// node is itself the SYNC producer (informational only).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTick {
    pub count: u32,
}

/// Tracks the CiA 301 SYNC counter (spec.md Section 4.9): increments
/// on every SYNC, wrapping at the largest configured synchronous-TPDO
/// divisor so `count % divisor == 0` keeps working after a wrap.
#[derive(Debug, Clone, Copy)]
pub struct SyncCoordinator {
    count: u32,
    max_divisor: u32,
    pub producer_enabled: bool,
    pub cycle_period_us: u32,
    pub producer_timer_id: Option<u32>,
}

impl SyncCoordinator {
    pub fn new() -> Self {
        Self {
            count: 0,
            max_divisor: 1,
            producer_enabled: false,
            cycle_period_us: 0,
            producer_timer_id: None,
        }
    }

    /// Registers a synchronous TPDO's transmission-type divisor so the
    /// counter wraps at the least common bound needed by all
    /// configured synchronous TPDOs. Using the largest single divisor
    /// is sufficient since `N % divisor` only needs to be exact at
    /// multiples of `divisor` itself.
    pub fn register_divisor(&mut self, divisor: u8) {
        let divisor = divisor.max(1) as u32;
        if divisor > self.max_divisor {
            self.max_divisor = divisor;
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Advances the counter on SYNC reception or producer tick
    /// (spec.md Section 4.9).
    pub fn on_sync(&mut self) -> SyncTick {
        self.count += 1;
        if self.count > self.max_divisor {
            self.count = 1;
        }
        SyncTick { count: self.count }
    }

    pub fn is_producer(&self) -> bool {
        self.producer_enabled && self.cycle_period_us > 0
    }
}

impl Default for SyncCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_increments_and_wraps_at_max_divisor() {
        let mut sync = SyncCoordinator::new();
        sync.register_divisor(4);
        for expected in 1..=4u32 {
            assert_eq!(sync.on_sync().count, expected);
        }
        assert_eq!(sync.on_sync().count, 1);
    }

    #[test]
    fn producer_requires_enable_and_nonzero_cycle() {
        let mut sync = SyncCoordinator::new();
        assert!(!sync.is_producer());
        sync.producer_enabled = true;
        assert!(!sync.is_producer());
        sync.cycle_period_us = 1000;
        assert!(sync.is_producer());
    }
}
