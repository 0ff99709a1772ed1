//! SPI master with the waveform offloaded to a parallel unit
//!
//! The host side ([`SpiMaster`]) validates requests and posts them through a
//! one-word [`Mailbox`]; the unit side ([`shifter::Shifter`]) generates the
//! clock edges and posts results back. See [`command`] for the word layout.

pub mod command;
mod error;
pub mod mailbox;
mod master;
pub mod shifter;
mod unit;

pub use error::SpiError;
pub use mailbox::Mailbox;
pub use master::{SpiMaster, Unchecked};
pub use unit::{ParallelUnit, UnitPool};
