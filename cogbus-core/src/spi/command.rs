//! Mailbox command encoding
//!
//! # Word layout
//!
//! ```text
//!  31       24 23      16 15       8 7        0
//! ┌───────────┬──────────┬──────────┬──────────┐
//! │  reserved │  flags   │   bits   │ function │   command word
//! └───────────┴──────────┴──────────┴──────────┘
//! ┌─┬───────────────────────────────────────────┐
//! │1│              value (31 bits)              │   response word
//! └─┴───────────────────────────────────────────┘
//! ```
//!
//! Flags: bit 0 phase, bit 1 polarity (idle high), bit 2 bit order (MSB
//! first). Payload words written by the host after a command carry at most
//! 31 bits, so neither payloads nor commands can collide with the idle
//! sentinel.
//!
//! The two largest 31-bit values would flag into [`BOOTING`] and [`IDLE`].
//! They are sent as [`ESCAPE`] with the low bit selecting which, so a
//! response word never reads as a sentinel.

use cogbus_hal::spi::{BitOrder, Mode, Phase, Polarity};

use super::error::SpiError;
use super::mailbox::{BOOTING, IDLE};
use crate::config::MAX_PAR_BITS;

/// Offset of the bit-count field
pub const BITS_OFFSET: u32 = 8;

/// Offset of the mode flags byte
pub const FLAGS_OFFSET: u32 = 16;

/// Marks a word written by the unit as a response
pub const RESPONSE_FLAG: u32 = 1 << 31;

/// Mask of the value carried by a payload or response word
pub const VALUE_MASK: u32 = !RESPONSE_FLAG;

/// Response word for the values whose flagged form is a sentinel
///
/// Bit 31 is clear and the top byte is non-zero, so it is neither a
/// flagged response nor a command.
pub const ESCAPE: u32 = 0x7E00_0000;

/// Function codes understood by the parallel unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Function {
    /// Shift a value out; payload follows
    Send = 0,
    /// Shift a value in; response follows
    Read = 1,
    /// Shift out with no clock delays
    SendFast = 2,
    /// Shift in with no clock delays
    ReadFast = 3,
    /// Stream one sector of bytes in
    ReadSector = 4,
    /// Change polarity and phase
    SetMode = 5,
    /// Change bit order
    SetBitMode = 6,
    /// Change clock frequency; payload follows
    SetFreq = 7,
    /// Report clock frequency; response follows
    GetFreq = 8,
}

impl Function {
    /// Function for a code, `None` if unknown
    pub const fn from_u8(code: u8) -> Option<Self> {
        use Function::*;
        Some(match code {
            0 => Send,
            1 => Read,
            2 => SendFast,
            3 => ReadFast,
            4 => ReadSector,
            5 => SetMode,
            6 => SetBitMode,
            7 => SetFreq,
            8 => GetFreq,
            _ => return None,
        })
    }
}

/// Phase, polarity and bit-order flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModeFlags(u8);

impl ModeFlags {
    /// Sample on the second clock transition
    pub const PHASE: u8 = 1 << 0;
    /// Clock idles high
    pub const POLARITY: u8 = 1 << 1;
    /// Most significant bit first
    pub const BITMODE: u8 = 1 << 2;

    /// Flags from a raw byte, ignoring unknown bits
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & (Self::PHASE | Self::POLARITY | Self::BITMODE))
    }

    /// Raw flag byte
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Flags describing a mode
    pub const fn from_mode(mode: Mode) -> Self {
        let mut bits = 0;
        if matches!(mode.phase(), Phase::CaptureOnSecondTransition) {
            bits |= Self::PHASE;
        }
        if matches!(mode.polarity(), Polarity::IdleHigh) {
            bits |= Self::POLARITY;
        }
        Self(bits)
    }

    /// Flags describing a bit order
    pub const fn from_bit_order(order: BitOrder) -> Self {
        match order {
            BitOrder::MsbFirst => Self(Self::BITMODE),
            BitOrder::LsbFirst => Self(0),
        }
    }

    /// Mode encoded by the phase and polarity flags
    pub const fn mode(self) -> Mode {
        let polarity = if self.0 & Self::POLARITY != 0 {
            Polarity::IdleHigh
        } else {
            Polarity::IdleLow
        };
        let phase = if self.0 & Self::PHASE != 0 {
            Phase::CaptureOnSecondTransition
        } else {
            Phase::CaptureOnFirstTransition
        };
        Mode::from_parts(polarity, phase)
    }

    /// Bit order encoded by the bit-order flag
    pub const fn bit_order(self) -> BitOrder {
        if self.0 & Self::BITMODE != 0 {
            BitOrder::MsbFirst
        } else {
            BitOrder::LsbFirst
        }
    }
}

/// A decoded command word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Command {
    pub function: Function,
    pub bits: u8,
    pub flags: ModeFlags,
}

impl Command {
    /// A command with no bit count or flags
    pub const fn new(function: Function) -> Self {
        Self {
            function,
            bits: 0,
            flags: ModeFlags(0),
        }
    }

    /// A shift command, checking the bit count
    pub fn shift(function: Function, bits: u8) -> Result<Self, SpiError> {
        if bits > MAX_PAR_BITS {
            return Err(SpiError::TooManyBits);
        }
        if bits == 0 {
            return Err(SpiError::InvalidByteSize);
        }
        Ok(Self {
            function,
            bits,
            flags: ModeFlags(0),
        })
    }

    /// Attach mode flags
    pub const fn with_flags(mut self, flags: ModeFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Pack into a mailbox word
    pub const fn encode(self) -> u32 {
        (self.function as u32)
            | ((self.bits as u32) << BITS_OFFSET)
            | ((self.flags.0 as u32) << FLAGS_OFFSET)
    }

    /// Unpack a mailbox word, `None` if it is not a command
    pub const fn decode(word: u32) -> Option<Self> {
        if word & 0xFF00_0000 != 0 {
            return None;
        }
        let function = match Function::from_u8(word as u8) {
            Some(f) => f,
            None => return None,
        };
        Some(Self {
            function,
            bits: (word >> BITS_OFFSET) as u8,
            flags: ModeFlags::from_bits((word >> FLAGS_OFFSET) as u8),
        })
    }
}

/// Mask selecting the low `bits` bits of a value
pub const fn bit_mask(bits: u8) -> u32 {
    if bits >= 32 {
        u32::MAX
    } else {
        (1u32 << bits) - 1
    }
}

/// Tag a value as a response
pub const fn response(value: u32) -> u32 {
    let word = RESPONSE_FLAG | (value & VALUE_MASK);
    if word >= BOOTING {
        ESCAPE | (word & 1)
    } else {
        word
    }
}

/// Value of a response word, `None` if the word is not a response
///
/// The sentinels are never responses.
pub const fn response_value(word: u32) -> Option<u32> {
    if word & !1 == ESCAPE {
        Some((BOOTING & VALUE_MASK) | (word & 1))
    } else if word & RESPONSE_FLAG != 0 && word < BOOTING {
        Some(word & VALUE_MASK)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_send_layout() {
        let word = Command::shift(Function::Send, 12).unwrap().encode();
        assert_eq!(word, 0x0000_0C00);
    }

    #[test]
    fn test_mode_flags_layout() {
        let cmd = Command::new(Function::SetMode).with_flags(ModeFlags::from_mode(Mode::Mode3));
        assert_eq!(cmd.encode(), 0x0003_0005);

        let cmd = Command::new(Function::SetBitMode)
            .with_flags(ModeFlags::from_bit_order(BitOrder::MsbFirst));
        assert_eq!(cmd.encode(), 0x0004_0006);
    }

    #[test]
    fn test_shift_rejects_wide_values() {
        assert_eq!(
            Command::shift(Function::Send, 32),
            Err(SpiError::TooManyBits)
        );
        assert_eq!(
            Command::shift(Function::Read, 0),
            Err(SpiError::InvalidByteSize)
        );
        assert!(Command::shift(Function::Read, 31).is_ok());
    }

    #[test]
    fn test_sentinels_are_not_commands() {
        assert_eq!(Command::decode(IDLE), None);
        assert_eq!(Command::decode(BOOTING), None);
        assert_eq!(Command::decode(0x0000_0009), None);
    }

    #[test]
    fn test_sentinels_are_not_responses() {
        assert_eq!(response_value(IDLE), None);
        assert_eq!(response_value(BOOTING), None);

        assert_eq!(response(0x7FFF_FFFF), ESCAPE | 1);
        assert_eq!(response(0x7FFF_FFFE), ESCAPE);
        assert_eq!(response_value(ESCAPE | 1), Some(0x7FFF_FFFF));
        assert_eq!(response_value(ESCAPE), Some(0x7FFF_FFFE));
        assert_eq!(Command::decode(ESCAPE | 1), None);
        assert_eq!(response_value(response(0x7FFF_FFFD)), Some(0x7FFF_FFFD));
    }

    #[test]
    fn test_flags_describe_every_mode() {
        for mode in [Mode::Mode0, Mode::Mode1, Mode::Mode2, Mode::Mode3] {
            assert_eq!(ModeFlags::from_mode(mode).mode(), mode);
        }
        for order in [BitOrder::LsbFirst, BitOrder::MsbFirst] {
            assert_eq!(ModeFlags::from_bit_order(order).bit_order(), order);
        }
    }

    proptest! {
        #[test]
        fn prop_payloads_never_look_idle(value: u32, bits in 1u8..=31) {
            prop_assert_ne!(value & bit_mask(bits), IDLE);
        }

        #[test]
        fn prop_response_differs_from_command(func in 0u8..=8, bits in 0u8..=31, value: u32) {
            let cmd = Command::decode(func as u32 | (bits as u32) << BITS_OFFSET).unwrap();
            let resp = response(value);
            prop_assert_ne!(resp, cmd.encode());
            prop_assert_eq!(response_value(resp), Some(value & VALUE_MASK));
            prop_assert_eq!(response_value(cmd.encode()), None);
        }

        #[test]
        fn prop_responses_never_look_like_sentinels(value: u32) {
            let resp = response(value);
            prop_assert_ne!(resp, IDLE);
            prop_assert_ne!(resp, BOOTING);
        }
    }
}
