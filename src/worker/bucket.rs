//! Buffers and the bounded buckets that hold them

use std::collections::TryReserveError;

/// An opaque block of heap memory
///
/// The contents are never read. A zero-filled buffer has had every page
/// written, so the OS has to back it with real memory; an untouched one only
/// reserves address space through the allocator.
#[derive(Debug)]
pub struct Buffer {
    data: Vec<u8>,
}

impl Buffer {
    /// Allocate a buffer of `size` bytes
    ///
    /// # Errors
    ///
    /// Returns the allocator's failure instead of aborting the process.
    pub fn allocate(size: usize, zero_fill: bool) -> Result<Self, TryReserveError> {
        let mut data = Vec::new();
        data.try_reserve_exact(size)?;
        if zero_fill {
            // capacity is already reserved, so this cannot reallocate
            data.resize(size, 0);
        }
        Ok(Self { data })
    }

    /// Size of the allocation in bytes
    pub fn size(&self) -> usize {
        self.data.capacity()
    }
}

/// A bounded, ordered collection of buffers owned by one worker
///
/// Appending the buffer that brings the length to `capacity` empties the
/// bucket in the same call. Between calls the length is always below
/// `capacity`.
#[derive(Debug)]
pub struct Bucket {
    buffers: Vec<Buffer>,
    capacity: usize,
}

impl Bucket {
    /// Create an empty bucket that clears itself at `capacity` buffers
    ///
    /// `capacity` must be at least 1; configuration validation guarantees it.
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0, "bucket capacity must be positive");
        Self {
            buffers: Vec::new(),
            capacity,
        }
    }

    /// Append one buffer, releasing every buffer if the bucket is now full
    ///
    /// Returns true if the append cleared the bucket.
    pub fn append(&mut self, buffer: Buffer) -> bool {
        self.buffers.push(buffer);
        if self.buffers.len() >= self.capacity {
            self.buffers.clear();
            return true;
        }
        false
    }

    /// Release every buffer
    pub fn clear(&mut self) {
        self.buffers.clear();
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

}
