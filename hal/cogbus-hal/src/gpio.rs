//! GPIO pin abstractions
//!
//! Pins are identified by number on a single 32-bit port. The bus engines
//! work with pin masks so a whole port snapshot can be tested in one read.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of pins on the port
pub const PIN_COUNT: u8 = 32;

/// A validated pin number (0-31)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
pub struct Pin(u8);

impl Pin {
    /// Create a pin, returning `None` if the number is off the port
    pub const fn new(number: u8) -> Option<Self> {
        if number < PIN_COUNT {
            Some(Self(number))
        } else {
            None
        }
    }

    /// Pin number on the port
    pub const fn number(self) -> u8 {
        self.0
    }

    /// Single-bit mask selecting this pin in a port snapshot
    pub const fn mask(self) -> u32 {
        1 << self.0
    }
}

impl TryFrom<u8> for Pin {
    type Error = u8;

    fn try_from(number: u8) -> Result<Self, Self::Error> {
        Pin::new(number).ok_or(number)
    }
}

impl From<Pin> for u8 {
    fn from(pin: Pin) -> Self {
        pin.0
    }
}

/// Pin direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// High impedance; the line floats to its pull-up
    Input,
    /// Driven from the output latch
    Output,
}

/// Digital output pin
///
/// Used by consumers for chip-select lines next to an SPI master.
pub trait OutputPin {
    /// Set the pin high (logic 1)
    fn set_high(&mut self);

    /// Set the pin low (logic 0)
    fn set_low(&mut self);

    /// Set the pin to a specific state
    fn set_state(&mut self, high: bool) {
        if high {
            self.set_high();
        } else {
            self.set_low();
        }
    }

    /// Check if the pin is currently set high
    fn is_set_high(&self) -> bool;

    /// Check if the pin is currently set low
    fn is_set_low(&self) -> bool {
        !self.is_set_high()
    }
}

/// Digital input pin
pub trait InputPin {
    /// Check if the pin reads high (logic 1)
    fn is_high(&self) -> bool;

    /// Check if the pin reads low (logic 0)
    fn is_low(&self) -> bool {
        !self.is_high()
    }
}

/// Pin that can be used for both input and output
pub trait IoPin: OutputPin + InputPin {}

// Blanket implementation for types that implement both traits
impl<T: OutputPin + InputPin> IoPin for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_range() {
        assert!(Pin::new(0).is_some());
        assert!(Pin::new(31).is_some());
        assert!(Pin::new(32).is_none());
        assert_eq!(Pin::try_from(40u8), Err(40));
    }

    #[test]
    fn test_pin_mask() {
        assert_eq!(Pin::new(0).map(Pin::mask), Some(0x0000_0001));
        assert_eq!(Pin::new(7).map(Pin::mask), Some(0x0000_0080));
        assert_eq!(Pin::new(31).map(Pin::mask), Some(0x8000_0000));
    }

    struct Latch(bool);

    impl OutputPin for Latch {
        fn set_high(&mut self) {
            self.0 = true;
        }
        fn set_low(&mut self) {
            self.0 = false;
        }
        fn is_set_high(&self) -> bool {
            self.0
        }
    }

    #[test]
    fn test_set_state_default() {
        let mut pin = Latch(false);
        pin.set_state(true);
        assert!(pin.is_set_high());
        pin.set_state(false);
        assert!(pin.is_set_low());
    }
}
