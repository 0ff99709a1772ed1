//! Analog-to-digital converters

pub mod mcp300x;

pub use mcp300x::{Channel, DiffChannel, Mcp300x};
