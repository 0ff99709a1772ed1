//! Configuration types
//!
//! Bus and board configuration structures. With the `serde` feature these
//! can be deserialized from a board description file.

pub mod board;
pub mod bus;

pub use board::*;
pub use bus::*;
