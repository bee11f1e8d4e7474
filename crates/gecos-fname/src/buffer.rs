//! Instrumented destination buffer.
//!
//! [`GuardedBuffer`] wraps caller storage of a fixed capacity. Writes inside
//! the capacity go to the storage. Writes at or past it land in a shadow
//! region and are recorded as [`CapacityViolation`]s, so an out-of-bounds
//! write is observed instead of corrupting memory.

use serde::Serialize;

/// A write at `offset` into a buffer that only holds `capacity` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapacityViolation {
    pub offset: usize,
    pub capacity: usize,
}

#[derive(Debug, Clone)]
pub struct GuardedBuffer<B = Vec<u8>> {
    storage: B,
    shadow: Vec<u8>,
    violations: Vec<CapacityViolation>,
}

impl GuardedBuffer<Vec<u8>> {
    /// Zero-filled buffer of `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(vec![0; capacity])
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> GuardedBuffer<B> {
    pub fn new(storage: B) -> Self {
        Self {
            storage,
            shadow: Vec::new(),
            violations: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.storage.as_ref().len()
    }

    /// Store `byte` at `offset`, recording a violation past the capacity.
    pub fn write(&mut self, offset: usize, byte: u8) {
        let capacity = self.capacity();
        if offset < capacity {
            self.storage.as_mut()[offset] = byte;
            return;
        }
        self.violations.push(CapacityViolation { offset, capacity });
        let idx = offset - capacity;
        if self.shadow.len() <= idx {
            self.shadow.resize(idx + 1, 0);
        }
        self.shadow[idx] = byte;
    }

    /// Byte at `offset`. Never-written shadow bytes read as NUL.
    pub fn read(&self, offset: usize) -> u8 {
        let storage = self.storage.as_ref();
        match storage.get(offset) {
            Some(&b) => b,
            None => self
                .shadow
                .get(offset - storage.len())
                .copied()
                .unwrap_or(0),
        }
    }

    /// Length of the string starting at `offset`, across storage and shadow.
    pub fn strlen_at(&self, offset: usize) -> usize {
        let end = self.capacity() + self.shadow.len();
        (offset..end)
            .position(|i| self.read(i) == 0)
            .unwrap_or(end.saturating_sub(offset))
    }

    /// The NUL-terminated string at the start of the buffer, including any
    /// part that spilled past the capacity. The NUL is not included.
    pub fn contents(&self) -> Vec<u8> {
        let len = self.strlen_at(0);
        (0..len).map(|i| self.read(i)).collect()
    }

    /// The bytes inside the capacity.
    pub fn as_bytes(&self) -> &[u8] {
        self.storage.as_ref()
    }

    /// Bytes written past the capacity, indexed from the capacity.
    pub fn spilled(&self) -> &[u8] {
        &self.shadow
    }

    pub fn violations(&self) -> &[CapacityViolation] {
        &self.violations
    }

    pub fn overflowed(&self) -> bool {
        !self.violations.is_empty()
    }
}
