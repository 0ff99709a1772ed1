//! Parallel execution units
//!
//! A parallel unit is an independently scheduled core that runs the
//! [`Shifter`](super::shifter::Shifter) service loop. Units are explicit
//! resources: a chip port hands them out through a [`UnitPool`], and each
//! [`SpiMaster`](super::SpiMaster) owns the one it was built with.

use heapless::Vec;

use super::error::SpiError;
use super::mailbox::Mailbox;
use crate::config::{BusConfig, ValidPins};

/// An execution unit that can host the SPI waveform generator
pub trait ParallelUnit {
    /// Start the shifter on this unit
    ///
    /// The shifter reports ready by writing the idle sentinel into
    /// `mailbox`; the caller waits for that, not for this call. Returns
    /// [`SpiError::CogNotStarted`] if the hardware refused to launch.
    fn launch(
        &mut self,
        mailbox: &'static Mailbox,
        pins: ValidPins,
        config: BusConfig,
    ) -> Result<(), SpiError>;

    /// Stop the unit, abandoning any command in flight
    fn halt(&mut self);
}

/// Fixed-capacity pool of free units
///
/// ```
/// use cogbus_core::spi::UnitPool;
///
/// let mut pool: UnitPool<u8, 2> = UnitPool::new();
/// pool.release(1).unwrap();
/// assert_eq!(pool.claim(), Some(1));
/// assert_eq!(pool.claim(), None);
/// ```
#[derive(Debug)]
pub struct UnitPool<U, const N: usize> {
    free: Vec<U, N>,
}

impl<U, const N: usize> UnitPool<U, N> {
    /// Create an empty pool
    pub const fn new() -> Self {
        Self { free: Vec::new() }
    }

    /// Take a free unit
    pub fn claim(&mut self) -> Option<U> {
        self.free.pop()
    }

    /// Return a unit to the pool, handing it back if the pool is full
    pub fn release(&mut self, unit: U) -> Result<(), U> {
        self.free.push(unit)
    }

    /// Number of free units
    pub fn available(&self) -> usize {
        self.free.len()
    }
}

impl<U, const N: usize> Default for UnitPool<U, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U, const N: usize> FromIterator<U> for UnitPool<U, N> {
    /// Collect at most `N` units; extras are dropped
    fn from_iter<I: IntoIterator<Item = U>>(iter: I) -> Self {
        let mut pool = Self::new();
        for unit in iter.into_iter().take(N) {
            let _ = pool.free.push(unit);
        }
        pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_until_empty() {
        let mut pool: UnitPool<u8, 4> = (1..=3).collect();
        assert_eq!(pool.available(), 3);

        let mut claimed = [0u8; 3];
        for slot in claimed.iter_mut() {
            *slot = pool.claim().unwrap();
        }
        claimed.sort();
        assert_eq!(claimed, [1, 2, 3]);
        assert_eq!(pool.claim(), None);
    }

    #[test]
    fn test_release_when_full() {
        let mut pool: UnitPool<u8, 1> = UnitPool::new();
        assert_eq!(pool.release(1), Ok(()));
        assert_eq!(pool.release(2), Err(2));
        assert_eq!(pool.available(), 1);
    }
}
