//! SPI bus abstractions
//!
//! Transfers are bit-granular rather than byte-granular: a single call can
//! shift anywhere from 1 to 31 bits, which is what ADC-style peripherals with
//! odd frame widths need.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// SPI bus master
///
/// Implemented by `cogbus_core::spi::SpiMaster`; drivers are written against
/// this trait so they can be tested with a fake bus.
pub trait SpiBus {
    /// Error type for SPI operations
    type Error;

    /// Shift `bits` bits of `value` out to the peripheral
    ///
    /// May return before the last clock edge. Call [`SpiBus::wait`] before
    /// deasserting chip-select.
    fn shift_out(&mut self, bits: u8, value: u32) -> Result<(), Self::Error>;

    /// Shift `bits` bits in from the peripheral
    ///
    /// The value is stored little-endian into `buffer`, whose length (1, 2 or
    /// 4 bytes) must be large enough for `bits`.
    fn shift_in(&mut self, bits: u8, buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// Block until the bus has finished the last operation
    fn wait(&mut self) -> Result<(), Self::Error>;

    /// Change clock polarity and phase
    fn set_mode(&mut self, mode: Mode) -> Result<(), Self::Error>;

    /// Change which bit is shifted first
    fn set_bit_order(&mut self, order: BitOrder) -> Result<(), Self::Error>;
}

/// SPI clock polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// Clock idles low (CPOL=0)
    IdleLow,
    /// Clock idles high (CPOL=1)
    IdleHigh,
}

impl Polarity {
    /// Clock line level while idle
    pub const fn idle_level(self) -> bool {
        matches!(self, Polarity::IdleHigh)
    }
}

/// SPI clock phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Data captured on first clock transition (CPHA=0)
    CaptureOnFirstTransition,
    /// Data captured on second clock transition (CPHA=1)
    CaptureOnSecondTransition,
}

/// SPI mode (combined polarity and phase)
///
/// | Mode | CPOL | CPHA |
/// |------|------|------|
/// | 0    | 0    | 0    |
/// | 1    | 0    | 1    |
/// | 2    | 1    | 0    |
/// | 3    | 1    | 1    |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Mode {
    /// Mode 0: CPOL=0, CPHA=0
    #[default]
    Mode0,
    /// Mode 1: CPOL=0, CPHA=1
    Mode1,
    /// Mode 2: CPOL=1, CPHA=0
    Mode2,
    /// Mode 3: CPOL=1, CPHA=1
    Mode3,
}

impl Mode {
    /// Build a mode from its polarity and phase
    pub const fn from_parts(polarity: Polarity, phase: Phase) -> Self {
        match (polarity, phase) {
            (Polarity::IdleLow, Phase::CaptureOnFirstTransition) => Mode::Mode0,
            (Polarity::IdleLow, Phase::CaptureOnSecondTransition) => Mode::Mode1,
            (Polarity::IdleHigh, Phase::CaptureOnFirstTransition) => Mode::Mode2,
            (Polarity::IdleHigh, Phase::CaptureOnSecondTransition) => Mode::Mode3,
        }
    }

    /// Clock polarity of this mode
    pub const fn polarity(self) -> Polarity {
        match self {
            Mode::Mode0 | Mode::Mode1 => Polarity::IdleLow,
            Mode::Mode2 | Mode::Mode3 => Polarity::IdleHigh,
        }
    }

    /// Clock phase of this mode
    pub const fn phase(self) -> Phase {
        match self {
            Mode::Mode0 | Mode::Mode2 => Phase::CaptureOnFirstTransition,
            Mode::Mode1 | Mode::Mode3 => Phase::CaptureOnSecondTransition,
        }
    }

    /// Mode from its number (0-3)
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Mode::Mode0),
            1 => Some(Mode::Mode1),
            2 => Some(Mode::Mode2),
            3 => Some(Mode::Mode3),
            _ => None,
        }
    }
}

impl From<Mode> for (Polarity, Phase) {
    fn from(mode: Mode) -> Self {
        (mode.polarity(), mode.phase())
    }
}

/// Which end of a value is shifted first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BitOrder {
    /// Least significant bit first
    LsbFirst,
    /// Most significant bit first
    #[default]
    MsbFirst,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parts_round_trip() {
        for mode in [Mode::Mode0, Mode::Mode1, Mode::Mode2, Mode::Mode3] {
            let (polarity, phase) = mode.into();
            assert_eq!(Mode::from_parts(polarity, phase), mode);
        }
    }

    #[test]
    fn test_mode_table() {
        assert_eq!(Mode::Mode2.polarity(), Polarity::IdleHigh);
        assert_eq!(Mode::Mode2.phase(), Phase::CaptureOnFirstTransition);
        assert_eq!(Mode::Mode1.polarity(), Polarity::IdleLow);
        assert_eq!(Mode::Mode1.phase(), Phase::CaptureOnSecondTransition);
        assert!(Mode::Mode3.polarity().idle_level());
        assert!(!Mode::Mode0.polarity().idle_level());
    }

    #[test]
    fn test_mode_from_index() {
        assert_eq!(Mode::from_index(3), Some(Mode::Mode3));
        assert_eq!(Mode::from_index(4), None);
    }
}
