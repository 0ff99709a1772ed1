//! MCP3004 / MCP3008 10-bit ADC
//!
//! # Transfer
//!
//! With chip-select low the host clocks out seven option bits, then clocks
//! in the conversion result:
//!
//! ```text
//!  MOSI: START SGL/DIFF D2 D1 D0 x x
//!  MISO:                               null B9 .. B0
//! ```
//!
//! The two trailing option bits give the converter its sample and null
//! periods before data appears. The chip uses SPI mode 2 (mode 0 also works)
//! and shifts MSB first.

use cogbus_core::config::SpiPins;
use cogbus_core::spi::{ParallelUnit, SpiError, SpiMaster};
use cogbus_hal::gpio::OutputPin;
use cogbus_hal::spi::{BitOrder, Mode, SpiBus};
use cogbus_hal::timing::CycleCounter;

/// Default SPI clock
pub const SPI_DEFAULT_FREQ: u32 = 100_000;

/// SPI mode used by the converter
pub const SPI_MODE: Mode = Mode::Mode2;

/// Bit order used by the converter
pub const SPI_BIT_ORDER: BitOrder = BitOrder::MsbFirst;

/// Option bits
const START: u8 = 0x10;
const SINGLE_ENDED: u8 = 0x08;
const DIFFERENTIAL: u8 = 0x00;

/// Option bits clocked out, including the two dead bits
const OPTN_WIDTH: u8 = 7;

/// Result bits clocked in
const DATA_WIDTH: u8 = 10;

/// Single-ended input
///
/// Channels 4 to 7 exist only on the MCP3008.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Channel {
    Ch0,
    Ch1,
    Ch2,
    Ch3,
    Ch4,
    Ch5,
    Ch6,
    Ch7,
}

/// Differential input pair, named positive then negative
///
/// Pairs above 3 exist only on the MCP3008.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DiffChannel {
    Diff0_1,
    Diff1_0,
    Diff2_3,
    Diff3_2,
    Diff4_5,
    Diff5_4,
    Diff6_7,
    Diff7_6,
}

/// Option word for a conversion
const fn options(mode: u8, channel: u8) -> u32 {
    ((START | mode | channel) as u32) << 2
}

/// MCP300x driver
pub struct Mcp300x<B, CS> {
    bus: B,
    cs: CS,
    always_set_mode: bool,
}

impl<B: SpiBus, CS: OutputPin> Mcp300x<B, CS> {
    /// Create a driver, deasserting chip-select
    pub fn new(bus: B, mut cs: CS) -> Self {
        cs.set_high();
        Self {
            bus,
            cs,
            always_set_mode: false,
        }
    }

    /// Re-apply mode and bit order before every conversion
    ///
    /// Needed when other devices on the same bus use different settings.
    pub fn always_set_mode(&mut self, enabled: bool) {
        self.always_set_mode = enabled;
    }

    /// Read a single-ended channel
    pub fn read(&mut self, channel: Channel) -> Result<u16, B::Error> {
        self.convert(options(SINGLE_ENDED, channel as u8))
    }

    /// Read a differential pair
    pub fn read_diff(&mut self, pair: DiffChannel) -> Result<u16, B::Error> {
        self.convert(options(DIFFERENTIAL, pair as u8))
    }

    /// Release the bus and chip-select pin
    pub fn release(self) -> (B, CS) {
        (self.bus, self.cs)
    }

    fn convert(&mut self, options: u32) -> Result<u16, B::Error> {
        if self.always_set_mode {
            self.bus.set_mode(SPI_MODE)?;
            self.bus.set_bit_order(SPI_BIT_ORDER)?;
        }

        let mut data = [0u8; 2];
        self.cs.set_low();
        let result = self
            .bus
            .shift_out(OPTN_WIDTH, options)
            .and_then(|_| self.bus.shift_in(DATA_WIDTH, &mut data))
            .and_then(|_| self.bus.wait());
        self.cs.set_high();
        result?;

        Ok(u16::from_le_bytes(data))
    }
}

impl<U, C, CS> Mcp300x<SpiMaster<U, C>, CS>
where
    U: ParallelUnit,
    C: CycleCounter,
    CS: OutputPin,
{
    /// Bring up the SPI master for the converter
    ///
    /// Starts the master at the default clock if it is idle; otherwise only
    /// switches it to the converter's mode and bit order.
    pub fn start(&mut self, pins: SpiPins) -> Result<(), SpiError> {
        self.cs.set_high();
        if self.bus.is_running() {
            self.bus.set_mode(SPI_MODE)?;
            self.bus.set_bit_mode(SPI_BIT_ORDER)
        } else {
            self.bus
                .start(pins, SPI_DEFAULT_FREQ, SPI_MODE, SPI_BIT_ORDER)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cogbus_core::sim::{leak_mailbox, SimClock, SimPort, SpiDevice, ThreadUnit};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Op {
        Out(u8, u32),
        In(u8),
        Wait,
        Mode(Mode),
        Order(BitOrder),
    }

    #[derive(Default)]
    struct FakeBus {
        ops: Vec<Op>,
        response: u16,
        fail_in: bool,
    }

    impl SpiBus for FakeBus {
        type Error = SpiError;

        fn shift_out(&mut self, bits: u8, value: u32) -> Result<(), SpiError> {
            self.ops.push(Op::Out(bits, value));
            Ok(())
        }

        fn shift_in(&mut self, bits: u8, buffer: &mut [u8]) -> Result<(), SpiError> {
            self.ops.push(Op::In(bits));
            if self.fail_in {
                return Err(SpiError::TimeoutRd);
            }
            buffer.copy_from_slice(&self.response.to_le_bytes()[..buffer.len()]);
            Ok(())
        }

        fn wait(&mut self) -> Result<(), SpiError> {
            self.ops.push(Op::Wait);
            Ok(())
        }

        fn set_mode(&mut self, mode: Mode) -> Result<(), SpiError> {
            self.ops.push(Op::Mode(mode));
            Ok(())
        }

        fn set_bit_order(&mut self, order: BitOrder) -> Result<(), SpiError> {
            self.ops.push(Op::Order(order));
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeCs {
        high: bool,
        toggles: usize,
    }

    impl OutputPin for FakeCs {
        fn set_high(&mut self) {
            self.high = true;
            self.toggles += 1;
        }

        fn set_low(&mut self) {
            self.high = false;
            self.toggles += 1;
        }

        fn is_set_high(&self) -> bool {
            self.high
        }
    }

    #[test]
    fn test_option_words() {
        assert_eq!(options(SINGLE_ENDED, Channel::Ch0 as u8), 0x60);
        assert_eq!(options(SINGLE_ENDED, Channel::Ch7 as u8), 0x7C);
        assert_eq!(options(DIFFERENTIAL, DiffChannel::Diff0_1 as u8), 0x40);
        assert_eq!(options(DIFFERENTIAL, DiffChannel::Diff7_6 as u8), 0x5C);
        // Every option word fits in the seven bits clocked out
        assert!(options(SINGLE_ENDED, 7) < 1 << OPTN_WIDTH);
    }

    #[test]
    fn test_read_single_ended() {
        let bus = FakeBus {
            response: 0x2AB,
            ..FakeBus::default()
        };
        let mut adc = Mcp300x::new(bus, FakeCs::default());

        assert_eq!(adc.read(Channel::Ch3), Ok(0x2AB));

        let (bus, cs) = adc.release();
        assert_eq!(bus.ops, [Op::Out(7, 0x6C), Op::In(10), Op::Wait]);
        assert!(cs.high);
        assert_eq!(cs.toggles, 3);
    }

    #[test]
    fn test_read_differential() {
        let mut adc = Mcp300x::new(FakeBus::default(), FakeCs::default());
        adc.read_diff(DiffChannel::Diff3_2).unwrap();

        let (bus, _) = adc.release();
        assert_eq!(bus.ops[0], Op::Out(7, 0x4C));
    }

    #[test]
    fn test_always_set_mode() {
        let mut adc = Mcp300x::new(FakeBus::default(), FakeCs::default());
        adc.always_set_mode(true);
        adc.read(Channel::Ch0).unwrap();

        let (bus, _) = adc.release();
        assert_eq!(
            bus.ops[..2],
            [Op::Mode(Mode::Mode2), Op::Order(BitOrder::MsbFirst)]
        );
    }

    #[test]
    fn test_failed_read_releases_chip_select() {
        let bus = FakeBus {
            fail_in: true,
            ..FakeBus::default()
        };
        let mut adc = Mcp300x::new(bus, FakeCs::default());

        assert_eq!(adc.read(Channel::Ch1), Err(SpiError::TimeoutRd));
        let (bus, cs) = adc.release();
        assert!(cs.high);
        // No wait after the failed transfer
        assert_eq!(bus.ops.last(), Some(&Op::In(10)));
    }

    fn master() -> (SpiMaster<ThreadUnit, SimClock>, SimPort) {
        let clock = SimClock::new(80_000_000);
        let port = SimPort::new(clock);
        let pins = SpiPins::new(0, 1, 2).validate().unwrap();
        port.attach_spi_device(SpiDevice::new(pins, SPI_MODE));
        let master = SpiMaster::new(ThreadUnit::new(port.clone()), clock, leak_mailbox());
        (master, port)
    }

    #[test]
    fn test_start_on_idle_master() {
        let (master, _) = master();
        let mut adc = Mcp300x::new(master, FakeCs::default());
        adc.start(SpiPins::new(0, 1, 2)).unwrap();

        let (master, _) = adc.release();
        assert!(master.is_running());
        assert_eq!(master.config().frequency, SPI_DEFAULT_FREQ);
        assert_eq!(master.config().mode, Mode::Mode2);
    }

    #[test]
    fn test_start_on_running_master_keeps_clock() {
        let (mut master, _) = master();
        master
            .start(SpiPins::new(0, 1, 2), 1_000_000, Mode::Mode0, BitOrder::LsbFirst)
            .unwrap();

        let mut adc = Mcp300x::new(master, FakeCs::default());
        adc.start(SpiPins::new(0, 1, 2)).unwrap();

        let (master, _) = adc.release();
        assert_eq!(master.unit().launches(), 1);
        assert_eq!(master.config().frequency, 1_000_000);
        assert_eq!(master.config().mode, Mode::Mode2);
        assert_eq!(master.config().bit_order, BitOrder::MsbFirst);
    }

    #[test]
    fn test_conversion_over_simulated_bus() {
        let (master, port) = master();
        let mut adc = Mcp300x::new(master, FakeCs::default());
        adc.start(SpiPins::new(0, 1, 2)).unwrap();

        port.with_spi_device(|d| {
            // Seven bits while the options go out, then the 10-bit result
            d.load_response(0, OPTN_WIDTH);
            d.load_response(0x1F3, DATA_WIDTH);
        });
        assert_eq!(adc.read(Channel::Ch5), Ok(0x1F3));

        let sent = port.with_spi_device(|d| d.received()[..7].to_vec());
        let word = sent
            .unwrap()
            .iter()
            .fold(0u32, |acc, &bit| (acc << 1) | bit as u32);
        assert_eq!(word, options(SINGLE_ENDED, Channel::Ch5 as u8));
    }
}
