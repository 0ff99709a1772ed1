//! Bit-banged I2C slave
//!
//! The protocol logic lives in [`machine`] as a pure transition function;
//! [`I2cSlave`] feeds it bus samples and carries out the pin actions it
//! returns.

pub mod buffer;
pub mod machine;
mod slave;

pub use buffer::ReceiveBuffer;
pub use cogbus_hal::i2c::{I2cConfigError, I2cSlaveConfig};
pub use slave::{I2cSlave, SlaveBus, SlaveHandler};
