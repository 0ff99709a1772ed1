//! Host-side simulation of the hardware the engines run on
//!
//! - [`SimClock`] / [`StepClock`]: cycle counters backed by wall time or by
//!   a fixed step per read
//! - [`SimPort`]: a shared 32-pin port with an attachable [`SpiDevice`]
//! - [`ThreadUnit`] / [`MuteUnit`]: parallel units backed by a thread, or
//!   by nothing at all
//! - [`ScriptedBus`] / [`MasterScript`]: an I2C master replayed one sample
//!   at a time
//!
//! Only built for tests or with the `std` feature.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Instant;

use core::cell::Cell;

use cogbus_hal::gpio::{Direction, Pin};
use cogbus_hal::spi::{Mode, Phase};
use cogbus_hal::timing::{CycleCounter, TimingPort};

use crate::config::{BusConfig, ValidPins};
use crate::spi::shifter::Shifter;
use crate::spi::{Mailbox, ParallelUnit, SpiError};

/// Allocate a mailbox that lives for the rest of the process
pub fn leak_mailbox() -> &'static Mailbox {
    Box::leak(Box::new(Mailbox::new()))
}

/// Cycle counter derived from wall time
#[derive(Debug, Clone, Copy)]
pub struct SimClock {
    start: Instant,
    hz: u32,
}

impl SimClock {
    pub fn new(hz: u32) -> Self {
        Self {
            start: Instant::now(),
            hz,
        }
    }
}

impl CycleCounter for SimClock {
    fn now(&self) -> u32 {
        let ns = self.start.elapsed().as_nanos();
        (ns * self.hz as u128 / 1_000_000_000) as u32
    }

    fn clock_hz(&self) -> u32 {
        self.hz
    }
}

/// Cycle counter that advances a fixed amount every time it is read
///
/// Makes timeouts deterministic: a wait of `t` cycles gives up after about
/// `t / step` polls.
#[derive(Debug)]
pub struct StepClock {
    now: Cell<u32>,
    step: u32,
    hz: u32,
}

impl StepClock {
    pub fn new(hz: u32, step: u32) -> Self {
        Self {
            now: Cell::new(0),
            step,
            hz,
        }
    }
}

impl CycleCounter for StepClock {
    fn now(&self) -> u32 {
        let now = self.now.get();
        self.now.set(now.wrapping_add(self.step));
        now
    }

    fn clock_hz(&self) -> u32 {
        self.hz
    }
}

/// SPI peripheral attached to a [`SimPort`]
///
/// Shifts a queued response out on MISO and records every MOSI bit it
/// samples, following the clock edges of its configured mode.
#[derive(Debug)]
pub struct SpiDevice {
    pins: ValidPins,
    mode: Mode,
    sclk: bool,
    miso: bool,
    presented: bool,
    pending: VecDeque<bool>,
    received: Vec<bool>,
}

impl SpiDevice {
    pub fn new(pins: ValidPins, mode: Mode) -> Self {
        Self {
            pins,
            mode,
            sclk: mode.polarity().idle_level(),
            miso: true,
            presented: false,
            pending: VecDeque::new(),
            received: Vec::new(),
        }
    }

    /// Queue `bits` bits of `value` for MISO, most significant bit first on
    /// the wire
    pub fn load_response(&mut self, value: u32, bits: u8) {
        for i in (0..bits).rev() {
            self.pending.push_back((value >> i) & 1 != 0);
        }
        if self.mode.phase() == Phase::CaptureOnFirstTransition && !self.presented {
            self.shift();
        }
    }

    /// MOSI bits sampled so far, in wire order
    pub fn received(&self) -> &[bool] {
        &self.received
    }

    /// Sampled bits packed into a word, first bit most significant
    pub fn received_word(&self) -> u32 {
        self.received
            .iter()
            .fold(0u32, |acc, &bit| (acc << 1) | bit as u32)
    }

    pub fn clear_received(&mut self) {
        self.received.clear();
    }

    fn shift(&mut self) {
        match self.pending.pop_front() {
            Some(bit) => {
                self.miso = bit;
                self.presented = true;
            }
            None => {
                self.miso = true;
                self.presented = false;
            }
        }
    }

    fn clock(&mut self, level: bool, mosi: bool) {
        if level == self.sclk {
            return;
        }
        self.sclk = level;

        let leading = level != self.mode.polarity().idle_level();
        let sample_edge = match self.mode.phase() {
            Phase::CaptureOnFirstTransition => leading,
            Phase::CaptureOnSecondTransition => !leading,
        };
        if sample_edge {
            self.received.push(mosi);
        } else {
            self.shift();
        }
    }
}

#[derive(Debug)]
struct PortState {
    latch: u32,
    outputs: u32,
    external: u32,
    device: Option<SpiDevice>,
}

impl PortState {
    fn level(&self, pin: Pin) -> bool {
        let word = (self.latch & self.outputs) | (self.external & !self.outputs);
        word & pin.mask() != 0
    }

    fn driven(&self, pin: Pin) -> bool {
        self.outputs & pin.mask() != 0
    }

    /// Forward an SCLK change to the device
    fn notify(&mut self) {
        let Some(pins) = self.device.as_ref().map(|d| d.pins) else {
            return;
        };
        if !self.driven(pins.sclk) {
            return;
        }
        let sclk = self.level(pins.sclk);
        let mosi = self.level(pins.mosi);
        if let Some(device) = self.device.as_mut() {
            device.clock(sclk, mosi);
        }
    }
}

/// Simulated pin port shared between the host and a [`ThreadUnit`]
///
/// Undriven lines read high.
#[derive(Debug, Clone)]
pub struct SimPort {
    clock: SimClock,
    state: Arc<Mutex<PortState>>,
}

impl SimPort {
    pub fn new(clock: SimClock) -> Self {
        Self {
            clock,
            state: Arc::new(Mutex::new(PortState {
                latch: 0,
                outputs: 0,
                external: u32::MAX,
                device: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PortState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Connect an SPI peripheral, replacing any previous one
    pub fn attach_spi_device(&self, device: SpiDevice) {
        self.lock().device = Some(device);
    }

    /// Run `f` against the attached peripheral
    pub fn with_spi_device<R>(&self, f: impl FnOnce(&mut SpiDevice) -> R) -> Option<R> {
        self.lock().device.as_mut().map(f)
    }

    /// Level currently on a pin, ignoring the peripheral
    pub fn output_level(&self, pin: Pin) -> bool {
        self.lock().level(pin)
    }

    /// Drive an undriven line from outside
    pub fn set_external(&self, pin: Pin, high: bool) {
        let mut state = self.lock();
        if high {
            state.external |= pin.mask();
        } else {
            state.external &= !pin.mask();
        }
    }
}

impl CycleCounter for SimPort {
    fn now(&self) -> u32 {
        self.clock.now()
    }

    fn clock_hz(&self) -> u32 {
        self.clock.clock_hz()
    }
}

impl TimingPort for SimPort {
    fn read_port(&mut self) -> u32 {
        let state = self.lock();
        let mut word = (state.latch & state.outputs) | (state.external & !state.outputs);
        if let Some(device) = state.device.as_ref() {
            let miso = device.pins.miso;
            if !state.driven(miso) {
                word &= !miso.mask();
                if device.miso {
                    word |= miso.mask();
                }
            }
        }
        word
    }

    fn write_pin(&mut self, pin: Pin, high: bool) {
        let mut state = self.lock();
        if high {
            state.latch |= pin.mask();
        } else {
            state.latch &= !pin.mask();
        }
        state.notify();
    }

    fn set_direction(&mut self, pin: Pin, direction: Direction) {
        let mut state = self.lock();
        match direction {
            Direction::Output => state.outputs |= pin.mask(),
            Direction::Input => state.outputs &= !pin.mask(),
        }
        state.notify();
    }
}

/// Parallel unit backed by a host thread running a [`Shifter`]
#[derive(Debug)]
pub struct ThreadUnit {
    port: SimPort,
    halted: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    launches: usize,
}

impl ThreadUnit {
    pub fn new(port: SimPort) -> Self {
        Self {
            port,
            halted: Arc::new(AtomicBool::new(false)),
            handle: None,
            launches: 0,
        }
    }

    /// Number of successful launches
    pub fn launches(&self) -> usize {
        self.launches
    }

    /// Check whether the thread is alive
    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    pub fn port(&self) -> &SimPort {
        &self.port
    }
}

impl ParallelUnit for ThreadUnit {
    fn launch(
        &mut self,
        mailbox: &'static Mailbox,
        pins: ValidPins,
        config: BusConfig,
    ) -> Result<(), SpiError> {
        if self.handle.is_some() {
            return Err(SpiError::CogNotStarted);
        }
        self.halted.store(false, Ordering::SeqCst);
        let port = self.port.clone();
        let halted = self.halted.clone();
        let handle = std::thread::Builder::new()
            .name("spi-unit".into())
            .spawn(move || {
                let mut shifter = Shifter::new(port, mailbox, pins, config);
                shifter.serve(|| halted.load(Ordering::Acquire));
                shifter.into_port();
            })
            .map_err(|_| SpiError::CogNotStarted)?;
        self.handle = Some(handle);
        self.launches += 1;
        Ok(())
    }

    fn halt(&mut self) {
        self.halted.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ThreadUnit {
    fn drop(&mut self) {
        self.halt();
    }
}

/// Parallel unit that launches but never services commands
#[derive(Debug, Default)]
pub struct MuteUnit {
    /// Report ready after launch
    pub signal_ready: bool,
    pub launches: usize,
    pub halts: usize,
}

impl MuteUnit {
    /// Unit that never reports ready
    pub fn silent() -> Self {
        Self::default()
    }

    /// Unit that reports ready and then ignores everything
    pub fn deaf() -> Self {
        Self {
            signal_ready: true,
            ..Self::default()
        }
    }
}

impl ParallelUnit for MuteUnit {
    fn launch(&mut self, mailbox: &'static Mailbox, _: ValidPins, _: BusConfig) -> Result<(), SpiError> {
        self.launches += 1;
        if self.signal_ready {
            mailbox.release();
        }
        Ok(())
    }

    fn halt(&mut self) {
        self.halts += 1;
    }
}

/// SDA direction change made by the slave
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdaEvent {
    /// Pulled low
    Held,
    /// Let float
    Released,
}

/// Timing port that replays a fixed sequence of (SCL, SDA) samples
///
/// Each `read_port` consumes one sample. Running past the end panics, so a
/// test that over-reads fails loudly.
#[derive(Debug)]
pub struct ScriptedBus {
    samples: VecDeque<(bool, bool)>,
    scl: Pin,
    sda: Pin,
    events: Vec<SdaEvent>,
    reads: Cell<u32>,
}

impl ScriptedBus {
    pub fn new(samples: impl IntoIterator<Item = (bool, bool)>, scl: Pin, sda: Pin) -> Self {
        Self {
            samples: samples.into_iter().collect(),
            scl,
            sda,
            events: Vec::new(),
            reads: Cell::new(0),
        }
    }

    /// Samples not yet consumed
    pub fn remaining(&self) -> usize {
        self.samples.len()
    }

    /// Every SDA hold and release, in order
    pub fn sda_events(&self) -> &[SdaEvent] {
        &self.events
    }
}

impl CycleCounter for ScriptedBus {
    fn now(&self) -> u32 {
        self.reads.get()
    }

    fn clock_hz(&self) -> u32 {
        1_000_000
    }
}

impl TimingPort for ScriptedBus {
    fn read_port(&mut self) -> u32 {
        let Some((scl, sda)) = self.samples.pop_front() else {
            panic!("bus script exhausted");
        };
        self.reads.set(self.reads.get().wrapping_add(1));
        let mut word = 0;
        if scl {
            word |= self.scl.mask();
        }
        if sda {
            word |= self.sda.mask();
        }
        word
    }

    fn write_pin(&mut self, _: Pin, _: bool) {}

    fn set_direction(&mut self, pin: Pin, direction: Direction) {
        if pin == self.sda {
            self.events.push(match direction {
                Direction::Output => SdaEvent::Held,
                Direction::Input => SdaEvent::Released,
            });
        }
    }
}

/// Builder for the sample sequence an I2C master puts on the bus
///
/// SDA only changes while SCL is low, except inside start, restart and stop
/// conditions. The acknowledge slot after each written byte shows SDA low,
/// as if the slave acknowledged.
#[derive(Debug, Clone, Default)]
pub struct MasterScript {
    levels: Vec<(bool, bool)>,
}

impl MasterScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idle bus, then SDA falls with SCL high
    pub fn start(mut self) -> Self {
        self.levels.extend([(true, true), (true, false)]);
        self
    }

    /// SDA rises with SCL low, SCL rises, then SDA falls
    pub fn restart(mut self) -> Self {
        self.levels.extend([(false, true), (true, true), (true, false)]);
        self
    }

    /// Eight data bits MSB first plus the acknowledge clock
    pub fn write(mut self, byte: u8) -> Self {
        for i in (0..8).rev() {
            let bit = (byte >> i) & 1 != 0;
            self.levels.extend([(false, bit), (true, bit)]);
        }
        self.levels.extend([(false, false), (true, false), (false, false)]);
        self
    }

    /// Eight clocks for the slave to drive, then the master's ACK or NAK
    pub fn read(mut self, ack: bool) -> Self {
        for _ in 0..8 {
            self.levels.extend([(false, true), (true, true)]);
        }
        self.levels.extend([(false, !ack), (true, !ack)]);
        self
    }

    /// SDA rises while SCL is high
    pub fn stop(mut self) -> Self {
        self.levels.extend([(false, false), (true, false), (true, true)]);
        self
    }

    pub fn into_levels(self) -> Vec<(bool, bool)> {
        self.levels
    }

    pub fn into_bus(self, scl: Pin, sda: Pin) -> ScriptedBus {
        ScriptedBus::new(self.levels, scl, sda)
    }
}
