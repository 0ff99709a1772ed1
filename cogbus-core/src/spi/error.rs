//! SPI error codes
//!
//! The numeric codes form one contiguous range starting at 1; success is
//! `Ok(())` rather than a zero code.

use core::fmt;

/// Errors reported by the SPI master
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SpiError {
    /// Pin number is off the port
    InvalidPin = 1,
    /// Clock could not be initialised
    InvalidClockInit,
    /// Mode is not one of the four SPI modes
    InvalidMode,
    /// Pins overlap
    InvalidPinMask,
    /// More bits requested than one mailbox word can carry
    TooManyBits,
    /// Unit did not acknowledge a command in time
    Timeout,
    /// Unit did not deliver read data in time
    TimeoutRd,
    /// Parameter is wider than the destination
    ExcessiveParSz,
    /// No unit could be launched, or none is running to stop
    CogNotStarted,
    /// Operation requires a running unit
    ModuleNotRunning,
    /// Frequency is zero or not below a quarter of the core clock
    InvalidFreq,
    /// Destination size or bit count is unusable
    InvalidByteSize,
    /// Destination is not aligned for its size
    AddrMisalign,
    /// Bit order not recognised
    InvalidBitMode,
}

impl SpiError {
    /// First error code
    pub const BEGIN: u8 = SpiError::InvalidPin as u8;

    /// Last error code
    pub const END: u8 = SpiError::InvalidBitMode as u8;

    /// Numeric error code
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Error for a numeric code, `None` for 0 or anything out of range
    pub const fn from_code(code: u8) -> Option<Self> {
        use SpiError::*;
        Some(match code {
            1 => InvalidPin,
            2 => InvalidClockInit,
            3 => InvalidMode,
            4 => InvalidPinMask,
            5 => TooManyBits,
            6 => Timeout,
            7 => TimeoutRd,
            8 => ExcessiveParSz,
            9 => CogNotStarted,
            10 => ModuleNotRunning,
            11 => InvalidFreq,
            12 => InvalidByteSize,
            13 => AddrMisalign,
            14 => InvalidBitMode,
            _ => return None,
        })
    }

    /// Configuration errors are raised before anything touches the bus
    pub const fn is_configuration(self) -> bool {
        !matches!(
            self,
            SpiError::Timeout
                | SpiError::TimeoutRd
                | SpiError::CogNotStarted
                | SpiError::ModuleNotRunning
        )
    }
}

impl fmt::Display for SpiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            SpiError::InvalidPin => "invalid pin",
            SpiError::InvalidClockInit => "invalid clock initialisation",
            SpiError::InvalidMode => "invalid mode",
            SpiError::InvalidPinMask => "invalid pin mask",
            SpiError::TooManyBits => "too many bits",
            SpiError::Timeout => "timed out waiting for unit",
            SpiError::TimeoutRd => "timed out waiting for read data",
            SpiError::ExcessiveParSz => "parameter too large",
            SpiError::CogNotStarted => "unit not started",
            SpiError::ModuleNotRunning => "module not running",
            SpiError::InvalidFreq => "invalid frequency",
            SpiError::InvalidByteSize => "invalid byte size",
            SpiError::AddrMisalign => "misaligned address",
            SpiError::InvalidBitMode => "invalid bit mode",
        };
        write!(f, "SPI error {}: {}", self.code(), msg)
    }
}

impl embedded_hal::spi::Error for SpiError {
    fn kind(&self) -> embedded_hal::spi::ErrorKind {
        embedded_hal::spi::ErrorKind::Other
    }
}
