//! Cycle-counted timing and raw pin access
//!
//! The engines never sleep; every delay is a busy-wait against a free-running
//! cycle counter that wraps at 2^32. Deadlines are compared with wrapping
//! arithmetic so a wait that straddles the wrap still terminates.

use crate::gpio::{Direction, Pin};

/// Free-running core cycle counter
pub trait CycleCounter {
    /// Current cycle count (wraps)
    fn now(&self) -> u32;

    /// Core clock frequency in Hz
    fn clock_hz(&self) -> u32;

    /// Deadline `cycles` from now
    fn deadline(&self, cycles: u32) -> u32 {
        self.now().wrapping_add(cycles)
    }

    /// Check whether `deadline` has passed
    fn expired(&self, deadline: u32) -> bool {
        is_past(self.now(), deadline)
    }
}

/// Check whether `now` is at or past `deadline`, tolerating counter wrap
///
/// Valid while the two values are less than 2^31 cycles apart.
pub const fn is_past(now: u32, deadline: u32) -> bool {
    (now.wrapping_sub(deadline) as i32) >= 0
}

/// Timing Port: cycle counter plus direct pin access
///
/// This is the only capability the bit-level engines need, which keeps them
/// independent of any particular chip and lets tests drive them from a
/// simulated bus.
pub trait TimingPort: CycleCounter {
    /// Snapshot of all input levels, bit `n` for pin `n`
    fn read_port(&mut self) -> u32;

    /// Set the output latch of a pin
    fn write_pin(&mut self, pin: Pin, high: bool);

    /// Set the direction of a pin
    fn set_direction(&mut self, pin: Pin, direction: Direction);

    /// Read a single pin level
    fn read_pin(&mut self, pin: Pin) -> bool {
        self.read_port() & pin.mask() != 0
    }

    /// Spin until the cycle counter reaches `deadline`
    fn wait_until(&mut self, deadline: u32) {
        while !self.expired(deadline) {
            core::hint::spin_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_past_simple() {
        assert!(is_past(100, 100));
        assert!(is_past(101, 100));
        assert!(!is_past(99, 100));
    }

    #[test]
    fn test_is_past_across_wrap() {
        let deadline = 10u32;
        let before = u32::MAX - 5;
        assert!(!is_past(before, deadline));
        assert!(is_past(20, deadline));
    }

    struct Fixed(u32);

    impl CycleCounter for Fixed {
        fn now(&self) -> u32 {
            self.0
        }
        fn clock_hz(&self) -> u32 {
            80_000_000
        }
    }

    #[test]
    fn test_deadline_wraps() {
        let clock = Fixed(u32::MAX - 1);
        let deadline = clock.deadline(4);
        assert_eq!(deadline, 2);
        assert!(!clock.expired(deadline));
        assert!(Fixed(3).expired(deadline));
    }
}
