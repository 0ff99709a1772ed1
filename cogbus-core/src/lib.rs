//! Synchronous serial bus engines
//!
//! This crate contains the two protocol engines of the HAL:
//!
//! - [`spi`]: an SPI master whose clock-edge generation runs on a dedicated
//!   parallel unit, driven from the host through a one-word mailbox
//! - [`i2c`]: a bit-banged I2C slave that owns its execution context and
//!   answers a single 7-bit address
//! - [`config`]: bus and board configuration types
//!
//! Both engines talk to hardware only through the traits in `cogbus-hal`.
//! With the `std` feature the [`sim`] module provides a simulated clock, pin
//! port and thread-backed parallel unit so the engines can run on the host.

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod config;
pub mod i2c;
pub mod spi;

#[cfg(any(test, feature = "std"))]
pub mod sim;

pub use config::{BoardConfig, BusConfig, SpiPins};
pub use i2c::{I2cSlave, ReceiveBuffer, SlaveBus, SlaveHandler};
pub use spi::{Mailbox, ParallelUnit, SpiError, SpiMaster, UnitPool};
