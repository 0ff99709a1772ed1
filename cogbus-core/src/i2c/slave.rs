//! Bit-banged I2C slave engine
//!
//! [`I2cSlave`] owns its execution context: once [`I2cSlave::run`] is called
//! it samples the bus forever. All clock waits are unbounded busy-waits on
//! pin level, so a handler that runs too long makes the engine miss the next
//! bus transition.

use cogbus_hal::gpio::{Direction, Pin};
use cogbus_hal::i2c::{I2cConfigError, I2cSlaveConfig};
use cogbus_hal::timing::TimingPort;

use super::buffer::ReceiveBuffer;
use super::machine::{Action, Sample, State};

/// Application callbacks
///
/// Both run inside the engine's sampling loop and should return quickly.
pub trait SlaveHandler<P: TimingPort, const N: usize> {
    /// A write from the master has finished
    ///
    /// Drain [`SlaveBus::read`] here; unread bytes are discarded when this
    /// returns.
    fn on_receive(&mut self, bus: &mut SlaveBus<P, N>) {
        let _ = bus;
    }

    /// The master wants to read
    ///
    /// Call [`SlaveBus::write`] once per byte. Writes after the master
    /// answers NAK are ignored.
    fn on_request(&mut self, bus: &mut SlaveBus<P, N>) {
        let _ = bus;
    }
}

/// Handler that ignores every transaction
impl<P: TimingPort, const N: usize> SlaveHandler<P, N> for () {}

/// The transaction currently addressed to us
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
struct Session {
    read: bool,
    request_ended: bool,
}

/// Bus access handed to [`SlaveHandler`] callbacks
pub struct SlaveBus<P, const N: usize> {
    port: P,
    config: I2cSlaveConfig,
    buffer: ReceiveBuffer<N>,
    session: Option<Session>,
}

impl<P: TimingPort, const N: usize> SlaveBus<P, N> {
    fn new(mut port: P, config: I2cSlaveConfig) -> Self {
        for pin in [config.scl, config.sda] {
            port.write_pin(pin, false);
            port.set_direction(pin, Direction::Input);
        }
        Self {
            port,
            config,
            buffer: ReceiveBuffer::new(),
            session: None,
        }
    }

    /// Our 7-bit address
    pub fn address(&self) -> u8 {
        self.config.address
    }

    /// Configured bus frequency hint
    pub fn frequency(&self) -> u32 {
        self.config.frequency
    }

    /// Clock line
    pub fn scl(&self) -> Pin {
        self.config.scl
    }

    /// Data line
    pub fn sda(&self) -> Pin {
        self.config.sda
    }

    /// Number of received bytes not yet read
    pub fn available(&self) -> usize {
        self.buffer.available()
    }

    /// Take the next received byte
    ///
    /// Bytes come back in the reverse of the order the master sent them.
    /// Returns `None` once the buffer is drained.
    pub fn read(&mut self) -> Option<u8> {
        self.buffer.read()
    }

    /// Check whether the master has ended the current read with a NAK
    ///
    /// Also true outside a read transaction.
    pub fn request_ended(&self) -> bool {
        match self.session {
            Some(session) => !session.read || session.request_ended,
            None => true,
        }
    }

    /// Send one byte to the master, MSB first
    ///
    /// Only meaningful inside [`SlaveHandler::on_request`]. Samples the
    /// master's acknowledge afterwards; a NAK ends the request and turns
    /// later writes into no-ops.
    pub fn write(&mut self, byte: u8) {
        if self.request_ended() {
            return;
        }

        self.wait_scl(false);
        for bit in (0..8).rev() {
            if byte >> bit & 1 != 0 {
                self.release_sda();
            } else {
                self.hold_sda();
            }
            self.wait_scl(true);
            self.wait_scl(false);
        }

        self.release_sda();
        // Acknowledge is read from the same sample that saw the clock rise
        let nak = self.wait_scl(true).sda;
        if nak {
            debug!("I2C: master NAK, request ended");
            if let Some(session) = self.session.as_mut() {
                session.request_ended = true;
            }
        }
    }

    /// Underlying port
    pub fn port(&self) -> &P {
        &self.port
    }

    fn sample(&mut self) -> Sample {
        Sample::from_port(self.port.read_port(), self.config.scl, self.config.sda)
    }

    /// Spin until SCL reaches `high`, returning the sample that saw it
    fn wait_scl(&mut self, high: bool) -> Sample {
        loop {
            let sample = self.sample();
            if sample.scl == high {
                return sample;
            }
        }
    }

    /// Drive SDA low (latch is already low)
    fn hold_sda(&mut self) {
        self.port.set_direction(self.config.sda, Direction::Output);
    }

    /// Let SDA float high
    fn release_sda(&mut self) {
        self.port.set_direction(self.config.sda, Direction::Input);
    }
}

/// I2C slave engine
///
/// `N` is the receive buffer capacity in bytes.
pub struct I2cSlave<P, H, const N: usize> {
    bus: SlaveBus<P, N>,
    handler: H,
    state: State,
}

impl<P, H, const N: usize> I2cSlave<P, H, N>
where
    P: TimingPort,
    H: SlaveHandler<P, N>,
{
    /// Validate the configuration and release both lines
    pub fn new(config: I2cSlaveConfig, port: P, handler: H) -> Result<Self, I2cConfigError> {
        config.validate()?;
        info!(
            "I2C slave at {=u8:#x} on SCL {=u8} SDA {=u8}",
            config.address,
            config.scl.number(),
            config.sda.number()
        );
        Ok(Self {
            bus: SlaveBus::new(port, config),
            handler,
            state: State::INITIAL,
        })
    }

    /// Serve the bus forever
    pub fn run(&mut self) -> ! {
        loop {
            self.step();
        }
    }

    /// Take one bus sample and advance the state machine
    ///
    /// Callbacks run from inside this call.
    pub fn step(&mut self) {
        let sample = self.bus.sample();
        loop {
            let (next, action) = self.state.transition(self.bus.config.address, sample);
            self.state = next;
            self.apply(action);
            if !self.state.is_transient() {
                break;
            }
        }
    }

    fn apply(&mut self, action: Action) {
        match action {
            Action::None => {}
            Action::Addressed { read, .. } => {
                self.bus.session = Some(Session {
                    read,
                    request_ended: false,
                });
            }
            Action::Ignored { address } => {
                trace!("I2C: ignoring address {=u8:#x}", address);
            }
            Action::HoldSda => self.bus.hold_sda(),
            Action::ReleaseSda { received } => {
                self.bus.release_sda();
                if let Some(byte) = received {
                    self.bus.buffer.append(byte);
                }
            }
            Action::Request => {
                self.handler.on_request(&mut self.bus);
                self.bus.session = None;
            }
            Action::ReceiveEnd { restart } => {
                debug!(
                    "I2C: received {=usize} bytes, restart {=bool}",
                    self.bus.available(),
                    restart
                );
                self.handler.on_receive(&mut self.bus);
                self.bus.buffer.reset();
                self.bus.session = None;
            }
        }
    }

    /// Current machine state
    pub fn state(&self) -> State {
        self.state
    }

    /// Bus shared with the handler
    pub fn bus(&self) -> &SlaveBus<P, N> {
        &self.bus
    }

    /// Registered handler
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Mutable access to the handler
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }
}
