//! Waveform generator running on the parallel unit
//!
//! The shifter owns the SPI pins for as long as its unit runs. It polls the
//! mailbox for commands, generates clock edges with cycle-counted delays and
//! posts results back as response words.

use cogbus_hal::gpio::Direction;
use cogbus_hal::spi::{BitOrder, Mode, Phase};
use cogbus_hal::timing::TimingPort;

use super::command::{bit_mask, response, Command, Function};
use super::mailbox::{Mailbox, IDLE};
use crate::config::{BusConfig, ValidPins, MAX_PAR_BITS, SECTOR_SIZE};

/// Unit-side SPI engine
pub struct Shifter<P> {
    port: P,
    mailbox: &'static Mailbox,
    pins: ValidPins,
    mode: Mode,
    bit_order: BitOrder,
    frequency: u32,
    half_period: u32,
}

impl<P: TimingPort> Shifter<P> {
    /// Claim the pins and park the clock at its idle level
    pub fn new(mut port: P, mailbox: &'static Mailbox, pins: ValidPins, config: BusConfig) -> Self {
        port.write_pin(pins.sclk, config.mode.polarity().idle_level());
        port.write_pin(pins.mosi, true);
        port.set_direction(pins.sclk, Direction::Output);
        port.set_direction(pins.mosi, Direction::Output);
        port.set_direction(pins.miso, Direction::Input);

        let half_period = half_period(port.clock_hz(), config.frequency);
        Self {
            port,
            mailbox,
            pins,
            mode: config.mode,
            bit_order: config.bit_order,
            frequency: config.frequency,
            half_period,
        }
    }

    /// Service the mailbox forever
    pub fn run(&mut self) -> ! {
        loop {
            self.serve(|| false);
        }
    }

    /// Announce ready, then service the mailbox until `halted` returns true
    pub fn serve(&mut self, halted: impl Fn() -> bool) {
        self.mailbox.release();
        while !halted() {
            if !self.poll(&halted) {
                core::hint::spin_loop();
            }
        }
    }

    /// Execute the pending command, if any
    ///
    /// Returns `true` if a command was executed.
    pub fn poll(&mut self, halted: &impl Fn() -> bool) -> bool {
        let Some(command) = Command::decode(self.mailbox.load()) else {
            return false;
        };

        match command.function {
            Function::Send | Function::SendFast => {
                self.mailbox.release();
                let Some(value) = self.take_payload(halted) else {
                    return true;
                };
                let fast = command.function == Function::SendFast;
                self.shift_out(command.bits, value, fast);
                self.mailbox.release();
            }
            Function::Read | Function::ReadFast => {
                let fast = command.function == Function::ReadFast;
                let value = self.shift_in(command.bits, fast);
                self.mailbox.store(response(value));
            }
            Function::ReadSector => {
                for _ in 0..SECTOR_SIZE {
                    let byte = self.shift_in(8, true);
                    self.mailbox.store(response(byte));
                    while !self.mailbox.is_idle() {
                        if halted() {
                            return true;
                        }
                    }
                }
            }
            Function::SetMode => {
                self.mode = command.flags.mode();
                let idle = self.mode.polarity().idle_level();
                self.port.write_pin(self.pins.sclk, idle);
                self.mailbox.release();
            }
            Function::SetBitMode => {
                self.bit_order = command.flags.bit_order();
                self.mailbox.release();
            }
            Function::SetFreq => {
                self.mailbox.release();
                let Some(frequency) = self.take_payload(halted) else {
                    return true;
                };
                self.frequency = frequency;
                self.half_period = half_period(self.port.clock_hz(), frequency);
                self.mailbox.release();
            }
            Function::GetFreq => {
                self.mailbox.store(response(self.frequency));
            }
        }
        true
    }

    /// Current bus configuration as seen by the unit
    pub fn config(&self) -> BusConfig {
        BusConfig::new(self.frequency, self.mode, self.bit_order)
    }

    /// Release the pins
    pub fn into_port(mut self) -> P {
        self.port.set_direction(self.pins.sclk, Direction::Input);
        self.port.set_direction(self.pins.mosi, Direction::Input);
        self.port
    }

    fn take_payload(&self, halted: &impl Fn() -> bool) -> Option<u32> {
        loop {
            let word = self.mailbox.load();
            if word != IDLE {
                return Some(word);
            }
            if halted() {
                return None;
            }
        }
    }

    /// Counts above [`MAX_PAR_BITS`] arrive unchecked from the fast path and
    /// are clamped.
    fn shift_out(&mut self, bits: u8, value: u32, fast: bool) {
        let bits = bits.min(MAX_PAR_BITS);
        let value = value & bit_mask(bits);
        let mut deadline = self.port.now();
        for i in 0..bits {
            let bit = match self.bit_order {
                BitOrder::MsbFirst => (value >> (bits - 1 - i)) & 1,
                BitOrder::LsbFirst => (value >> i) & 1,
            };
            self.clock_bit(bit != 0, &mut deadline, fast);
        }
    }

    fn shift_in(&mut self, bits: u8, fast: bool) -> u32 {
        let bits = bits.min(MAX_PAR_BITS);
        let mut value = 0u32;
        let mut deadline = self.port.now();
        for i in 0..bits {
            let bit = self.clock_bit(true, &mut deadline, fast) as u32;
            match self.bit_order {
                BitOrder::MsbFirst => value = (value << 1) | bit,
                BitOrder::LsbFirst => value |= bit << i,
            }
        }
        self.port.write_pin(self.pins.mosi, true);
        value
    }

    /// Clock one bit out on MOSI while sampling MISO
    fn clock_bit(&mut self, out: bool, deadline: &mut u32, fast: bool) -> bool {
        let idle = self.mode.polarity().idle_level();
        let sampled;

        match self.mode.phase() {
            Phase::CaptureOnFirstTransition => {
                self.port.write_pin(self.pins.mosi, out);
                self.half_wait(deadline, fast);
                self.port.write_pin(self.pins.sclk, !idle);
                sampled = self.port.read_pin(self.pins.miso);
                self.half_wait(deadline, fast);
                self.port.write_pin(self.pins.sclk, idle);
            }
            Phase::CaptureOnSecondTransition => {
                self.port.write_pin(self.pins.sclk, !idle);
                self.port.write_pin(self.pins.mosi, out);
                self.half_wait(deadline, fast);
                self.port.write_pin(self.pins.sclk, idle);
                sampled = self.port.read_pin(self.pins.miso);
                self.half_wait(deadline, fast);
            }
        }

        sampled
    }

    fn half_wait(&mut self, deadline: &mut u32, fast: bool) {
        if fast {
            return;
        }
        *deadline = deadline.wrapping_add(self.half_period);
        self.port.wait_until(*deadline);
    }
}

/// Cycles per half clock period, at least one
pub fn half_period(clock_hz: u32, frequency: u32) -> u32 {
    if frequency == 0 {
        return u32::MAX >> 1;
    }
    (clock_hz / frequency.saturating_mul(2)).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpiPins;
    use crate::sim::{SimClock, SimPort, SpiDevice};
    use static_cell::StaticCell;

    const CLOCK_HZ: u32 = 80_000_000;

    fn shifter(mode: Mode, order: BitOrder) -> (Shifter<SimPort>, SimPort, &'static Mailbox) {
        static MAILBOXES: [StaticCell<Mailbox>; 16] = [const { StaticCell::new() }; 16];
        static NEXT: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);
        let slot = NEXT.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let mailbox: &'static Mailbox = MAILBOXES[slot].init(Mailbox::new());

        let pins = SpiPins::new(0, 1, 2).validate().unwrap();
        let port = SimPort::new(SimClock::new(CLOCK_HZ));
        port.attach_spi_device(SpiDevice::new(pins, mode));
        let config = BusConfig::new(1_000_000, mode, order);
        (Shifter::new(port.clone(), mailbox, pins, config), port, mailbox)
    }

    fn never() -> bool {
        false
    }

    #[test]
    fn test_half_period() {
        assert_eq!(half_period(80_000_000, 100_000), 400);
        assert_eq!(half_period(80_000_000, 19_999_999), 2);
        assert_eq!(half_period(10, 1_000), 1);
    }

    #[test]
    fn test_idle_mailbox_is_ignored() {
        let (mut shifter, _, mailbox) = shifter(Mode::Mode0, BitOrder::MsbFirst);
        mailbox.release();
        assert!(!shifter.poll(&never));
    }

    #[test]
    fn test_read_posts_response() {
        for mode in [Mode::Mode0, Mode::Mode1, Mode::Mode2, Mode::Mode3] {
            let (mut shifter, port, mailbox) = shifter(mode, BitOrder::MsbFirst);
            port.with_spi_device(|dev| dev.load_response(0xA5, 8));

            mailbox.store(Command::shift(Function::Read, 8).unwrap().encode());
            assert!(shifter.poll(&never));
            assert_eq!(mailbox.load(), response(0xA5), "mode {:?}", mode);
        }
    }

    #[test]
    fn test_read_lsb_first() {
        let (mut shifter, port, mailbox) = shifter(Mode::Mode0, BitOrder::LsbFirst);
        // Device presents bits 1,0,0,0 on the wire
        port.with_spi_device(|dev| dev.load_response(0b1000, 4));

        mailbox.store(Command::shift(Function::Read, 4).unwrap().encode());
        shifter.poll(&never);
        assert_eq!(mailbox.load(), response(0b0001));
    }

    #[test]
    fn test_oversized_read_is_clamped() {
        let (mut shifter, port, mailbox) = shifter(Mode::Mode0, BitOrder::LsbFirst);
        let mut command = Command::new(Function::ReadFast);
        command.bits = 40;

        mailbox.store(command.encode());
        assert!(shifter.poll(&never));
        assert_eq!(mailbox.load(), response(bit_mask(MAX_PAR_BITS)));
        assert_eq!(port.with_spi_device(|d| d.received().len()), Some(31));
    }

    #[test]
    fn test_set_mode_parks_clock() {
        let (mut shifter, port, mailbox) = shifter(Mode::Mode0, BitOrder::MsbFirst);
        assert!(!port.output_level(shifter.pins.sclk));

        let flags = super::super::command::ModeFlags::from_mode(Mode::Mode3);
        mailbox.store(Command::new(Function::SetMode).with_flags(flags).encode());
        shifter.poll(&never);

        assert!(mailbox.is_idle());
        assert_eq!(shifter.config().mode, Mode::Mode3);
        assert!(port.output_level(shifter.pins.sclk));
    }

    #[test]
    fn test_get_freq_reports_current() {
        let (mut shifter, _, mailbox) = shifter(Mode::Mode0, BitOrder::MsbFirst);
        mailbox.store(Command::new(Function::GetFreq).encode());
        shifter.poll(&never);
        assert_eq!(mailbox.load(), response(1_000_000));
    }

    #[test]
    fn test_halt_while_waiting_for_payload() {
        let (mut shifter, _, mailbox) = shifter(Mode::Mode0, BitOrder::MsbFirst);
        mailbox.store(Command::shift(Function::Send, 8).unwrap().encode());
        assert!(shifter.poll(&|| true));
        assert!(mailbox.is_idle());
    }
}
