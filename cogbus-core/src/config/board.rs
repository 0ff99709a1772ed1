//! Board configuration
//!
//! Aggregates everything needed to bring up both engines on one board.

use cogbus_hal::i2c::{I2cConfigError, I2cSlaveConfig};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::bus::{validate_frequency, BusConfig, SpiPins};
use crate::spi::SpiError;

/// Errors from board configuration validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Core clock is zero
    NoCoreClock,
    /// SPI pins or bus settings rejected
    Spi(SpiError),
    /// I2C slave settings rejected
    I2c(I2cConfigError),
}

impl From<SpiError> for ConfigError {
    fn from(e: SpiError) -> Self {
        ConfigError::Spi(e)
    }
}

impl From<I2cConfigError> for ConfigError {
    fn from(e: I2cConfigError) -> Self {
        ConfigError::I2c(e)
    }
}

/// SPI master settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpiSettings {
    pub pins: SpiPins,
    pub bus: BusConfig,
}

/// Complete board configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoardConfig {
    /// Core clock frequency in Hz
    pub core_clock_hz: u32,
    /// SPI master, if the board uses one
    pub spi: Option<SpiSettings>,
    /// I2C slave, if the board exposes one
    pub i2c_slave: Option<I2cSlaveConfig>,
}

impl BoardConfig {
    /// Default core clock (80 MHz)
    pub const DEFAULT_CORE_CLOCK_HZ: u32 = 80_000_000;

    /// Validate every configured engine against the core clock
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.core_clock_hz == 0 {
            return Err(ConfigError::NoCoreClock);
        }

        if let Some(spi) = &self.spi {
            let pins = spi.pins.validate()?;
            validate_frequency(spi.bus.frequency, self.core_clock_hz)?;

            if let Some(i2c) = &self.i2c_slave {
                let taken = pins.mosi.mask() | pins.miso.mask() | pins.sclk.mask();
                if taken & (i2c.scl.mask() | i2c.sda.mask()) != 0 {
                    return Err(ConfigError::Spi(SpiError::InvalidPinMask));
                }
            }
        }

        if let Some(i2c) = &self.i2c_slave {
            i2c.validate()?;
        }

        Ok(())
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            core_clock_hz: Self::DEFAULT_CORE_CLOCK_HZ,
            spi: None,
            i2c_slave: None,
        }
    }
}
