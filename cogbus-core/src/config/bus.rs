//! SPI bus configuration
//!
//! [`BusConfig`] is the configuration owned by a running
//! [`SpiMaster`](crate::spi::SpiMaster); [`SpiPins`] is the pin assignment
//! handed to the parallel unit at launch.

use cogbus_hal::gpio::Pin;
use cogbus_hal::spi::{BitOrder, Mode};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::spi::SpiError;

/// Largest number of bits one mailbox word can carry
pub const MAX_PAR_BITS: u8 = 31;

/// Extra cycles added to every timeout to cover loop overhead
pub const TIMEOUT_WIGGLE_ROOM: u32 = 400;

/// Bytes per sector read
pub const SECTOR_SIZE: usize = 512;

/// Cycles the host waits for the unit to acknowledge a command (0.1 s)
pub const fn write_timeout(clock_hz: u32) -> u32 {
    clock_hz / 10
}

/// Cycles the host waits for the unit to deliver read data (0.1 s)
pub const fn read_timeout(clock_hz: u32) -> u32 {
    clock_hz / 10
}

/// Exclusive upper bound on the SPI clock for a given core clock
pub const fn max_clock(clock_hz: u32) -> u32 {
    clock_hz >> 2
}

/// Check a clock frequency against the core clock
pub fn validate_frequency(frequency: u32, clock_hz: u32) -> Result<(), SpiError> {
    if frequency == 0 || frequency >= max_clock(clock_hz) {
        return Err(SpiError::InvalidFreq);
    }
    Ok(())
}

/// SPI bus configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BusConfig {
    /// Clock polarity and phase
    #[cfg_attr(feature = "serde", serde(default))]
    pub mode: Mode,
    /// Shift direction
    #[cfg_attr(feature = "serde", serde(default))]
    pub bit_order: BitOrder,
    /// Clock frequency in Hz
    pub frequency: u32,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Mode0,
            bit_order: BitOrder::MsbFirst,
            frequency: 100_000,
        }
    }
}

impl BusConfig {
    /// Create a configuration
    pub const fn new(frequency: u32, mode: Mode, bit_order: BitOrder) -> Self {
        Self {
            mode,
            bit_order,
            frequency,
        }
    }
}

/// Pin assignment for an SPI master
///
/// Pin numbers are kept raw until [`SpiPins::validate`] so an out-of-range
/// number can be reported as [`SpiError::InvalidPin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpiPins {
    /// Master out, slave in
    pub mosi: u8,
    /// Master in, slave out
    pub miso: u8,
    /// Serial clock
    pub sclk: u8,
}

/// Validated pin assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ValidPins {
    pub mosi: Pin,
    pub miso: Pin,
    pub sclk: Pin,
}

impl SpiPins {
    /// Create a pin assignment
    pub const fn new(mosi: u8, miso: u8, sclk: u8) -> Self {
        Self { mosi, miso, sclk }
    }

    /// Check every pin is on the port and no pin is used twice
    pub fn validate(&self) -> Result<ValidPins, SpiError> {
        let pin = |n| Pin::new(n).ok_or(SpiError::InvalidPin);
        let pins = ValidPins {
            mosi: pin(self.mosi)?,
            miso: pin(self.miso)?,
            sclk: pin(self.sclk)?,
        };

        let masks = [pins.mosi.mask(), pins.miso.mask(), pins.sclk.mask()];
        if masks.iter().fold(0u32, |acc, m| acc | m).count_ones() != 3 {
            return Err(SpiError::InvalidPinMask);
        }

        Ok(pins)
    }
}
