//! Single-word rendezvous between the host and the parallel unit
//!
//! Exactly one producer and one consumer touch the mailbox at any time; the
//! idle sentinel decides whose turn it is. The host writes only when the
//! word reads [`IDLE`] (or when it is consuming a response), the unit writes
//! only when it has taken or finished a command.

use portable_atomic::{AtomicU32, Ordering};

/// Mailbox is free; the unit is ready for a command
pub const IDLE: u32 = u32::MAX;

/// Unit is being launched and has not reported ready yet
pub const BOOTING: u32 = u32::MAX - 1;

/// Shared command/response cell
///
/// Place it in a `static` (or a `StaticCell`) so both execution contexts can
/// hold a `&'static Mailbox`.
#[derive(Debug)]
pub struct Mailbox {
    word: AtomicU32,
}

impl Mailbox {
    /// Create an idle mailbox
    pub const fn new() -> Self {
        Self {
            word: AtomicU32::new(IDLE),
        }
    }

    /// Current word
    pub fn load(&self) -> u32 {
        self.word.load(Ordering::Acquire)
    }

    /// Replace the word
    pub fn store(&self, word: u32) {
        self.word.store(word, Ordering::Release);
    }

    /// Return the mailbox to idle
    pub fn release(&self) {
        self.store(IDLE);
    }

    /// Check whether the mailbox is idle
    pub fn is_idle(&self) -> bool {
        self.load() == IDLE
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}
