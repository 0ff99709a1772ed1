//! Cogbus Hardware Abstraction Layer
//!
//! This crate defines the traits the bus engines in `cogbus-core` are
//! written against. A chip port implements them once; the engines and the
//! drivers built on top of them never touch registers directly.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Consumers (cogbus-drivers, app code)   │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  cogbus-core (SPI master, I2C slave)    │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  cogbus-hal (this crate - traits)       │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`gpio::OutputPin`], [`gpio::InputPin`] - Digital I/O
//! - [`timing::CycleCounter`], [`timing::TimingPort`] - Cycle-timed pin access
//! - [`spi::SpiBus`] - Bit-granular SPI master operations

#![no_std]
#![deny(unsafe_code)]

pub mod gpio;
pub mod i2c;
pub mod spi;
pub mod timing;

// Re-export key traits at crate root for convenience
pub use gpio::{Direction, InputPin, OutputPin, Pin};
pub use i2c::I2cSlaveConfig;
pub use spi::{BitOrder, Mode, SpiBus};
pub use timing::{CycleCounter, TimingPort};
