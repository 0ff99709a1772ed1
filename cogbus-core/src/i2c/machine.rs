//! I2C slave protocol state machine
//!
//! The machine is a pure function of (state, bus sample). It never touches
//! pins; it returns an [`Action`] that the engine carries out. Every wait is
//! level-triggered: a state that waits for SCL low advances on the first
//! sample with SCL low, whether or not a falling edge was seen.
//!
//! ```text
//!            ┌──────────────┐   SDA falls, SCL high
//!     ┌─────►│ AwaitStart   ├──────────────┐
//!     │      └──────────────┘              ▼
//!     │                            ┌──────────────┐
//!     │           restart ────────►│ ReadAddress  │
//!     │                            └──────┬───────┘
//!     │                                   ▼ 8 bits
//!     │   not us               ┌──────────────┐
//!     ├────────────────────────┤ AddressCheck │
//!     │                        └──────┬───────┘
//!     │                               ▼ match
//!     │                        ┌──────────────┐
//!     │                        │     Ack      │
//!     │                        └──┬────────┬──┘
//!     │                     read  │        │ write
//!     │                           ▼        ▼
//!     │                  ┌─────────┐  ┌─────────┐
//!     └──────────────────┤ Request │  │ Receive │──► stop / restart
//!                        └─────────┘  └─────────┘
//! ```

use cogbus_hal::gpio::Pin;

/// Levels of both lines at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Sample {
    pub scl: bool,
    pub sda: bool,
}

impl Sample {
    pub const fn new(scl: bool, sda: bool) -> Self {
        Self { scl, sda }
    }

    /// Extract the two lines from a port snapshot
    pub const fn from_port(port: u32, scl: Pin, sda: Pin) -> Self {
        Self {
            scl: port & scl.mask() != 0,
            sda: port & sda.mask() != 0,
        }
    }
}

/// Which clock level a bit reader is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Clock {
    /// Waiting for SCL low
    Low,
    /// Waiting for SCL high, then sample SDA
    High,
}

/// Progress through the acknowledge clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AckStage {
    /// Waiting for SCL low before pulling SDA down
    Setup,
    /// SDA held; waiting for SCL high
    Held,
    /// SDA held; waiting for SCL low to let go
    Release,
}

/// Where to go once the acknowledge bit is done
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AfterAck {
    /// Master is reading from us
    Request,
    /// Master is writing to us
    Receive,
    /// A data byte was acknowledged; store it and keep receiving
    Byte(u8),
}

/// Progress through one received byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReceiveStage {
    /// Waiting for a clock level before the next bit
    Bit(Clock),
    /// First bit sampled; SCL still high. If SDA moves now it was a stop or
    /// restart, not data.
    Watch,
}

/// Machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Waiting for SDA to fall while SCL is high
    AwaitStart { sda_high_seen: bool },
    /// Shifting in the address byte
    ReadAddress { value: u8, bits: u8, clock: Clock },
    /// Address byte complete; decide whether it is ours
    AddressCheck { byte: u8 },
    /// Driving the acknowledge bit
    Ack { stage: AckStage, then: AfterAck },
    /// Master read phase; the request handler runs now
    Request,
    /// Master write phase; shifting in data bytes
    Receive {
        value: u8,
        bits: u8,
        stage: ReceiveStage,
    },
}

/// Side effects requested by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    /// Nothing to do
    None,
    /// Address matched; a new session starts
    Addressed { address: u8, read: bool },
    /// Address belongs to another device
    Ignored { address: u8 },
    /// Pull SDA low
    HoldSda,
    /// Let SDA float, storing a received byte if there is one
    ReleaseSda { received: Option<u8> },
    /// Run the request handler
    Request,
    /// Write phase finished; run the receive handler
    ReceiveEnd { restart: bool },
}

impl State {
    /// Initial state
    pub const INITIAL: State = State::AwaitStart {
        sda_high_seen: false,
    };

    const ADDRESS: State = State::ReadAddress {
        value: 0,
        bits: 0,
        clock: Clock::Low,
    };

    const RECEIVE: State = State::Receive {
        value: 0,
        bits: 0,
        stage: ReceiveStage::Bit(Clock::Low),
    };

    /// States that decide without consuming a new sample
    pub const fn is_transient(&self) -> bool {
        matches!(self, State::AddressCheck { .. } | State::Request)
    }

    /// Advance on one sample
    ///
    /// `slave_address` is the 7-bit address this device answers.
    pub fn transition(self, slave_address: u8, sample: Sample) -> (State, Action) {
        match self {
            State::AwaitStart { sda_high_seen } => {
                if !sda_high_seen {
                    let next = State::AwaitStart {
                        sda_high_seen: sample.sda,
                    };
                    (next, Action::None)
                } else if sample.sda {
                    (self, Action::None)
                } else if sample.scl {
                    (State::ADDRESS, Action::None)
                } else {
                    (State::INITIAL, Action::None)
                }
            }

            State::ReadAddress { value, bits, clock } => match (clock, sample.scl) {
                (Clock::Low, false) => (
                    State::ReadAddress {
                        value,
                        bits,
                        clock: Clock::High,
                    },
                    Action::None,
                ),
                (Clock::High, true) => {
                    let value = (value << 1) | sample.sda as u8;
                    let bits = bits + 1;
                    if bits == 8 {
                        (State::AddressCheck { byte: value }, Action::None)
                    } else {
                        let next = State::ReadAddress {
                            value,
                            bits,
                            clock: Clock::Low,
                        };
                        (next, Action::None)
                    }
                }
                _ => (self, Action::None),
            },

            State::AddressCheck { byte } => {
                let address = byte >> 1;
                let read = byte & 1 != 0;
                if address == slave_address {
                    let then = if read {
                        AfterAck::Request
                    } else {
                        AfterAck::Receive
                    };
                    let next = State::Ack {
                        stage: AckStage::Setup,
                        then,
                    };
                    (next, Action::Addressed { address, read })
                } else {
                    (State::INITIAL, Action::Ignored { address })
                }
            }

            State::Ack { stage, then } => match (stage, sample.scl) {
                (AckStage::Setup, false) => (
                    State::Ack {
                        stage: AckStage::Held,
                        then,
                    },
                    Action::HoldSda,
                ),
                (AckStage::Held, true) => (
                    State::Ack {
                        stage: AckStage::Release,
                        then,
                    },
                    Action::None,
                ),
                (AckStage::Release, false) => {
                    let (next, received) = match then {
                        AfterAck::Request => (State::Request, None),
                        AfterAck::Receive => (State::RECEIVE, None),
                        AfterAck::Byte(byte) => (State::RECEIVE, Some(byte)),
                    };
                    (next, Action::ReleaseSda { received })
                }
                _ => (self, Action::None),
            },

            State::Request => (State::INITIAL, Action::Request),

            State::Receive { value, bits, stage } => match stage {
                ReceiveStage::Bit(Clock::Low) if !sample.scl => (
                    State::Receive {
                        value,
                        bits,
                        stage: ReceiveStage::Bit(Clock::High),
                    },
                    Action::None,
                ),
                ReceiveStage::Bit(Clock::High) if sample.scl => {
                    let value = (value << 1) | sample.sda as u8;
                    let bits = bits + 1;
                    let next = if bits == 1 {
                        State::Receive {
                            value,
                            bits,
                            stage: ReceiveStage::Watch,
                        }
                    } else if bits == 8 {
                        State::Ack {
                            stage: AckStage::Setup,
                            then: AfterAck::Byte(value),
                        }
                    } else {
                        State::Receive {
                            value,
                            bits,
                            stage: ReceiveStage::Bit(Clock::Low),
                        }
                    };
                    (next, Action::None)
                }
                ReceiveStage::Watch => {
                    let first_high = value & 1 != 0;
                    if !sample.scl {
                        // Clock fell: the first bit was data
                        let next = State::Receive {
                            value,
                            bits,
                            stage: ReceiveStage::Bit(Clock::High),
                        };
                        (next, Action::None)
                    } else if first_high && !sample.sda {
                        (State::ADDRESS, Action::ReceiveEnd { restart: true })
                    } else if !first_high && sample.sda {
                        (State::INITIAL, Action::ReceiveEnd { restart: false })
                    } else {
                        (self, Action::None)
                    }
                }
                _ => (self, Action::None),
            },
        }
    }
}

impl Default for State {
    fn default() -> Self {
        State::INITIAL
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::MasterScript;

    const ADDR: u8 = 0x42;

    /// Feed samples through the machine the way the engine does, resolving
    /// transient states on the same sample
    fn drive(mut state: State, samples: &[(bool, bool)]) -> (State, std::vec::Vec<Action>) {
        let mut actions = std::vec::Vec::new();
        for &(scl, sda) in samples {
            loop {
                let (next, action) = state.transition(ADDR, Sample::new(scl, sda));
                state = next;
                if action != Action::None {
                    actions.push(action);
                }
                if !state.is_transient() {
                    break;
                }
            }
        }
        (state, actions)
    }

    #[test]
    fn test_start_detection() {
        let (state, _) = drive(State::INITIAL, &[(true, true), (true, false)]);
        assert_eq!(state, State::ADDRESS);
    }

    #[test]
    fn test_sda_fall_with_clock_low_is_not_start() {
        let (state, _) = drive(State::INITIAL, &[(false, true), (false, false)]);
        assert_eq!(state, State::INITIAL);
    }

    #[test]
    fn test_address_bits_sampled_on_clock_high() {
        let samples = MasterScript::new().write(0x85).into_levels();
        let mut state = State::ADDRESS;
        // Only the eight data bit samples, not the ack slot
        for &(scl, sda) in &samples[..16] {
            state = state.transition(ADDR, Sample::new(scl, sda)).0;
        }
        assert_eq!(state, State::AddressCheck { byte: 0x85 });
    }

    #[test]
    fn test_matching_write_address_acks() {
        let samples = MasterScript::new()
            .start()
            .write(ADDR << 1)
            .into_levels();
        let (state, actions) = drive(State::INITIAL, &samples);

        assert_eq!(
            actions,
            [
                Action::Addressed {
                    address: ADDR,
                    read: false
                },
                Action::HoldSda,
                Action::ReleaseSda { received: None },
            ]
        );
        assert_eq!(state, State::RECEIVE);
    }

    #[test]
    fn test_foreign_address_is_ignored() {
        let samples = MasterScript::new()
            .start()
            .write(0x21 << 1)
            .write(0x99)
            .stop()
            .into_levels();
        let (state, actions) = drive(State::INITIAL, &samples);

        assert_eq!(actions, [Action::Ignored { address: 0x21 }]);
        assert!(matches!(state, State::AwaitStart { .. }));
    }

    #[test]
    fn test_receive_byte_then_stop() {
        let samples = MasterScript::new()
            .start()
            .write(ADDR << 1)
            .write(0x3C)
            .stop()
            .into_levels();
        let (state, actions) = drive(State::INITIAL, &samples);

        assert!(actions.contains(&Action::ReleaseSda {
            received: Some(0x3C)
        }));
        assert_eq!(
            actions.last(),
            Some(&Action::ReceiveEnd { restart: false })
        );
        assert!(matches!(state, State::AwaitStart { .. }));
    }

    #[test]
    fn test_restart_goes_straight_to_address() {
        let samples = MasterScript::new()
            .start()
            .write(ADDR << 1)
            .write(0xFF)
            .restart()
            .into_levels();
        let (state, actions) = drive(State::INITIAL, &samples);

        assert_eq!(actions.last(), Some(&Action::ReceiveEnd { restart: true }));
        assert_eq!(state, State::ADDRESS);
    }

    #[test]
    fn test_read_address_enters_request() {
        let samples = MasterScript::new()
            .start()
            .write((ADDR << 1) | 1)
            .into_levels();
        let (state, actions) = drive(State::INITIAL, &samples);

        assert_eq!(actions.last(), Some(&Action::Request));
        assert_eq!(state, State::INITIAL);
    }

    #[test]
    fn test_data_byte_with_high_first_bit_is_not_restart() {
        // 0x80: first bit high, then SCL falls normally
        let samples = MasterScript::new()
            .start()
            .write(ADDR << 1)
            .write(0x80)
            .write(0x01)
            .into_levels();
        let (_, actions) = drive(State::INITIAL, &samples);

        let received: std::vec::Vec<u8> = actions
            .iter()
            .filter_map(|a| match a {
                Action::ReleaseSda { received } => *received,
                _ => None,
            })
            .collect();
        assert_eq!(received, [0x80, 0x01]);
    }
}
