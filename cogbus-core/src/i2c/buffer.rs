//! Receive buffer for the I2C slave
//!
//! A single fill pointer serves both ends: bytes are appended downward from
//! the top of the storage and read back upward from the pointer. Reads
//! therefore return bytes in the reverse of arrival order. Consumers that
//! want arrival order can drain into a stack-ordered container and reverse.
//!
//! The pointer always lies in `0..=N`; `N` means empty.

/// Fixed-capacity receive buffer
#[derive(Debug, Clone)]
pub struct ReceiveBuffer<const N: usize> {
    data: [u8; N],
    ptr: usize,
}

impl<const N: usize> ReceiveBuffer<N> {
    /// Create an empty buffer
    pub const fn new() -> Self {
        Self {
            data: [0; N],
            ptr: N,
        }
    }

    /// Capacity in bytes
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Store a received byte
    ///
    /// Silently drops the byte once the buffer is full; the bus gives the
    /// slave no way to report it.
    pub fn append(&mut self, byte: u8) {
        if self.ptr > 0 {
            self.ptr -= 1;
            self.data[self.ptr] = byte;
        }
    }

    /// Take the next byte, most recently received first
    pub fn read(&mut self) -> Option<u8> {
        if self.ptr < N {
            let byte = self.data[self.ptr];
            self.ptr += 1;
            Some(byte)
        } else {
            None
        }
    }

    /// Number of unread bytes
    pub const fn available(&self) -> usize {
        N - self.ptr
    }

    /// Check whether no bytes are pending
    pub const fn is_empty(&self) -> bool {
        self.ptr == N
    }

    /// Check whether further appends will be dropped
    pub const fn is_full(&self) -> bool {
        self.ptr == 0
    }

    /// Discard everything not yet read
    pub fn reset(&mut self) {
        self.ptr = N;
    }
}

impl<const N: usize> Default for ReceiveBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
