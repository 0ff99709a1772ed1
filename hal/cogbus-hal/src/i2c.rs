//! I2C slave configuration
//!
//! The slave engine is purely reactive to the master's clock, so the
//! frequency here is a hint used for documentation and timing only.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::gpio::Pin;

/// Highest valid 7-bit address
pub const MAX_ADDRESS: u8 = 0x7F;

/// I2C slave configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct I2cSlaveConfig {
    /// 7-bit slave address
    pub address: u8,
    /// Clock line
    pub scl: Pin,
    /// Data line
    pub sda: Pin,
    /// Expected bus frequency in Hz
    #[cfg_attr(feature = "serde", serde(default = "default_frequency"))]
    pub frequency: u32,
}

#[cfg(feature = "serde")]
fn default_frequency() -> u32 {
    I2cSlaveConfig::FAST
}

/// Reasons an [`I2cSlaveConfig`] is rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cConfigError {
    /// Address does not fit in 7 bits
    InvalidAddress,
    /// SCL and SDA are the same pin
    SharedPin,
}

impl I2cSlaveConfig {
    /// Standard mode (100 kHz)
    pub const STANDARD: u32 = 100_000;

    /// Fast mode (400 kHz)
    pub const FAST: u32 = 400_000;

    /// Create a configuration at the fast-mode frequency hint
    pub const fn new(address: u8, scl: Pin, sda: Pin) -> Self {
        Self {
            address,
            scl,
            sda,
            frequency: Self::FAST,
        }
    }

    /// Override the frequency hint
    pub const fn with_frequency(mut self, frequency: u32) -> Self {
        self.frequency = frequency;
        self
    }

    /// Check the address and pin assignment
    pub fn validate(&self) -> Result<(), I2cConfigError> {
        if self.address > MAX_ADDRESS {
            return Err(I2cConfigError::InvalidAddress);
        }
        if self.scl == self.sda {
            return Err(I2cConfigError::SharedPin);
        }
        Ok(())
    }
}
