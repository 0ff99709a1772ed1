//! Peripheral drivers
//!
//! Drivers are written against the `cogbus-hal` traits, so they run on any
//! [`SpiBus`](cogbus_hal::SpiBus) implementation:
//!
//! - ADCs (MCP3004, MCP3008)

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod adc;
