//! Host-side SPI driver
//!
//! Every checked operation validates its arguments before touching the
//! mailbox, so a configuration error never leaves a half-posted command
//! behind. Blocking waits are bounded by the write timeout (unit accepting a
//! command) or the read timeout (unit delivering data), both one tenth of a
//! second of core cycles plus [`TIMEOUT_WIGGLE_ROOM`].
//!
//! While a response is awaited, any response word belongs to the host. The
//! host hands the mailbox back by writing [`IDLE`], which never decodes as a
//! response, so a sector read cannot mistake its own release for data.

use cogbus_hal::spi::{BitOrder, Mode, SpiBus};
use cogbus_hal::timing::CycleCounter;

use super::command::{response_value, Command, Function, ModeFlags, VALUE_MASK};
use super::error::SpiError;
use super::mailbox::{Mailbox, BOOTING, IDLE};
use super::unit::ParallelUnit;
use crate::config::{
    read_timeout, validate_frequency, write_timeout, BusConfig, SpiPins, ValidPins, SECTOR_SIZE,
    TIMEOUT_WIGGLE_ROOM,
};

/// SPI master driving a [`ParallelUnit`]
///
/// `C` is the host's cycle counter, used for timeouts.
#[derive(Debug)]
pub struct SpiMaster<U, C> {
    unit: U,
    clock: C,
    mailbox: &'static Mailbox,
    config: BusConfig,
    pins: Option<ValidPins>,
}

impl<U: ParallelUnit, C: CycleCounter> SpiMaster<U, C> {
    /// Create a stopped driver
    pub fn new(unit: U, clock: C, mailbox: &'static Mailbox) -> Self {
        Self {
            unit,
            clock,
            mailbox,
            config: BusConfig::default(),
            pins: None,
        }
    }

    /// Launch the unit and configure the bus
    ///
    /// On a running driver this only re-applies `mode` and `bit_order`;
    /// the pins and frequency are left as they are.
    pub fn start(
        &mut self,
        pins: SpiPins,
        frequency: u32,
        mode: Mode,
        bit_order: BitOrder,
    ) -> Result<(), SpiError> {
        if self.is_running() {
            self.set_mode(mode)?;
            return self.set_bit_mode(bit_order);
        }

        let pins = pins.validate()?;
        validate_frequency(frequency, self.clock.clock_hz())?;

        let config = BusConfig::new(frequency, mode, bit_order);
        self.mailbox.store(BOOTING);
        if let Err(e) = self.unit.launch(self.mailbox, pins, config) {
            self.mailbox.release();
            return Err(e);
        }

        if !self.poll_for(IDLE) {
            warn!("SPI unit did not report ready");
            self.unit.halt();
            self.mailbox.release();
            return Err(SpiError::CogNotStarted);
        }

        info!(
            "SPI unit started: MOSI {=u8} MISO {=u8} SCLK {=u8} at {=u32} Hz",
            pins.mosi.number(),
            pins.miso.number(),
            pins.sclk.number(),
            frequency
        );
        self.pins = Some(pins);
        self.set_mode(mode)?;
        self.set_bit_mode(bit_order)?;
        self.set_clock(frequency)
    }

    /// Halt the unit and release the mailbox
    pub fn stop(&mut self) -> Result<(), SpiError> {
        if self.pins.take().is_none() {
            return Err(SpiError::CogNotStarted);
        }
        self.unit.halt();
        self.mailbox.release();
        info!("SPI unit stopped");
        Ok(())
    }

    /// Check whether the unit has been started
    pub fn is_running(&self) -> bool {
        self.pins.is_some()
    }

    /// Shift `bits` bits of `value` out
    ///
    /// Returns once the unit has the value; the waveform may still be in
    /// progress. Use [`SpiMaster::wait`] to wait for the last edge.
    pub fn shift_out(&mut self, bits: u8, value: u32) -> Result<(), SpiError> {
        self.ensure_running()?;
        let command = Command::shift(Function::Send, bits)?;
        self.wait()?;
        self.mailbox.store(command.encode());
        self.wait()?;
        self.mailbox.store(value & VALUE_MASK);
        Ok(())
    }

    /// Shift `bits` bits in, storing the value little-endian into `buffer`
    ///
    /// `buffer` must be 1, 2 or 4 bytes long and wide enough for `bits`.
    pub fn shift_in(&mut self, bits: u8, buffer: &mut [u8]) -> Result<(), SpiError> {
        self.ensure_running()?;
        let command = Command::shift(Function::Read, bits)?;
        let len = buffer.len();
        if !matches!(len, 1 | 2 | 4) || len * 8 < bits as usize {
            return Err(SpiError::InvalidByteSize);
        }

        self.wait()?;
        self.mailbox.store(command.encode());
        let value = self.await_response(read_timeout(self.clock.clock_hz()))?;
        buffer.copy_from_slice(&value.to_le_bytes()[..len]);
        Ok(())
    }

    /// Change clock polarity and phase
    pub fn set_mode(&mut self, mode: Mode) -> Result<(), SpiError> {
        self.ensure_running()?;
        let command = Command::new(Function::SetMode).with_flags(ModeFlags::from_mode(mode));
        self.post(command)?;
        self.config.mode = mode;
        Ok(())
    }

    /// Change which bit is shifted first
    pub fn set_bit_mode(&mut self, bit_order: BitOrder) -> Result<(), SpiError> {
        self.ensure_running()?;
        let flags = ModeFlags::from_bit_order(bit_order);
        self.post(Command::new(Function::SetBitMode).with_flags(flags))?;
        self.config.bit_order = bit_order;
        Ok(())
    }

    /// Change the SPI clock frequency
    ///
    /// `frequency` must be non-zero and below a quarter of the core clock.
    pub fn set_clock(&mut self, frequency: u32) -> Result<(), SpiError> {
        self.ensure_running()?;
        validate_frequency(frequency, self.clock.clock_hz())?;
        self.post(Command::new(Function::SetFreq))?;
        self.mailbox.store(frequency);
        self.wait()?;
        self.config.frequency = frequency;
        debug!("SPI clock set to {=u32} Hz", frequency);
        Ok(())
    }

    /// Frequency the unit is currently clocking at
    pub fn get_clock(&mut self) -> Result<u32, SpiError> {
        self.ensure_running()?;
        self.wait()?;
        self.mailbox.store(Command::new(Function::GetFreq).encode());
        self.await_response(read_timeout(self.clock.clock_hz()))
    }

    /// Block until the unit has finished the last command
    pub fn wait(&mut self) -> Result<(), SpiError> {
        self.wait_specific(IDLE)
    }

    /// Block until the mailbox reads `value` or [`IDLE`]
    ///
    /// Bounded by the write timeout.
    pub fn wait_specific(&mut self, value: u32) -> Result<(), SpiError> {
        self.ensure_running()?;
        if self.poll_for(value) {
            Ok(())
        } else {
            warn!("SPI mailbox still {=u32:#x}", self.mailbox.load());
            Err(SpiError::Timeout)
        }
    }

    /// Bus configuration acknowledged by the unit
    pub fn config(&self) -> BusConfig {
        self.config
    }

    /// Pins in use, if running
    pub fn pins(&self) -> Option<ValidPins> {
        self.pins
    }

    /// The unit this driver launches
    pub fn unit(&self) -> &U {
        &self.unit
    }

    /// The shared mailbox
    pub fn mailbox(&self) -> &'static Mailbox {
        self.mailbox
    }

    /// Unvalidated, untimed transfers
    ///
    /// The returned handle skips every argument check and waits without a
    /// timeout. On a stopped driver or a stalled unit its calls never
    /// return.
    pub fn unchecked(&mut self) -> Unchecked<'_, U, C> {
        Unchecked { master: self }
    }

    fn ensure_running(&self) -> Result<(), SpiError> {
        if self.is_running() {
            Ok(())
        } else {
            Err(SpiError::ModuleNotRunning)
        }
    }

    /// Post a single-word command and wait for the unit to accept it
    fn post(&mut self, command: Command) -> Result<(), SpiError> {
        self.wait()?;
        self.mailbox.store(command.encode());
        self.wait()
    }

    /// Poll until the mailbox reads `value` or idle, within the write timeout
    fn poll_for(&self, value: u32) -> bool {
        let timeout = write_timeout(self.clock.clock_hz());
        let deadline = self.clock.deadline(timeout.saturating_add(TIMEOUT_WIGGLE_ROOM));
        loop {
            let word = self.mailbox.load();
            if word == IDLE || word == value {
                return true;
            }
            if self.clock.expired(deadline) {
                return false;
            }
            core::hint::spin_loop();
        }
    }

    fn await_response(&self, timeout: u32) -> Result<u32, SpiError> {
        let deadline = self.clock.deadline(timeout.saturating_add(TIMEOUT_WIGGLE_ROOM));
        loop {
            if let Some(value) = response_value(self.mailbox.load()) {
                self.mailbox.release();
                return Ok(value);
            }
            if self.clock.expired(deadline) {
                warn!("SPI unit returned no data after {=u32} cycles", timeout);
                return Err(SpiError::TimeoutRd);
            }
            core::hint::spin_loop();
        }
    }
}

impl<U: ParallelUnit, C: CycleCounter> SpiBus for SpiMaster<U, C> {
    type Error = SpiError;

    fn shift_out(&mut self, bits: u8, value: u32) -> Result<(), SpiError> {
        SpiMaster::shift_out(self, bits, value)
    }

    fn shift_in(&mut self, bits: u8, buffer: &mut [u8]) -> Result<(), SpiError> {
        SpiMaster::shift_in(self, bits, buffer)
    }

    fn wait(&mut self) -> Result<(), SpiError> {
        SpiMaster::wait(self)
    }

    fn set_mode(&mut self, mode: Mode) -> Result<(), SpiError> {
        SpiMaster::set_mode(self, mode)
    }

    fn set_bit_order(&mut self, order: BitOrder) -> Result<(), SpiError> {
        self.set_bit_mode(order)
    }
}

/// Fast path on a running [`SpiMaster`]
///
/// Transfers run without the half-period delays, so the bus clocks as fast
/// as the unit can toggle pins.
pub struct Unchecked<'a, U, C> {
    master: &'a mut SpiMaster<U, C>,
}

impl<U, C> Unchecked<'_, U, C> {
    fn spin_idle(&self) {
        while self.master.mailbox.load() != IDLE {
            core::hint::spin_loop();
        }
    }

    fn spin_response(&self) -> u32 {
        loop {
            if let Some(value) = response_value(self.master.mailbox.load()) {
                self.master.mailbox.release();
                return value;
            }
            core::hint::spin_loop();
        }
    }

    /// Shift `bits` bits of `value` out
    pub fn shift_out(&mut self, bits: u8, value: u32) {
        let mut command = Command::new(Function::SendFast);
        command.bits = bits;
        self.spin_idle();
        self.master.mailbox.store(command.encode());
        self.spin_idle();
        self.master.mailbox.store(value & VALUE_MASK);
    }

    /// Shift `bits` bits in
    pub fn shift_in(&mut self, bits: u8) -> u32 {
        let mut command = Command::new(Function::ReadFast);
        command.bits = bits;
        self.spin_idle();
        self.master.mailbox.store(command.encode());
        self.spin_response()
    }

    /// Read one sector, one byte per mailbox round trip
    pub fn shift_in_sector(&mut self, sector: &mut [u8; SECTOR_SIZE]) {
        self.spin_idle();
        self.master
            .mailbox
            .store(Command::new(Function::ReadSector).encode());
        for byte in sector.iter_mut() {
            *byte = self.spin_response() as u8;
        }
    }
}
