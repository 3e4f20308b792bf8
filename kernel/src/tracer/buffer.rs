//! Circular trace buffers.
//!
//! A trace buffer is a fixed-capacity byte queue behind a file descriptor.
//! Writes append at the write cursor, reads consume at the read cursor, both
//! wrap, and a separate free-space counter keeps full and empty states apart
//! when the cursors coincide. The invariant throughout is
//! `free + occupied == capacity`.
//!
//! The buffer's access mode is fixed at creation. The descriptor-level read
//! and write paths honor it; the tracers use the mode-blind [`TraceBuffer::push`]
//! and [`TraceBuffer::pop`] directly when they own both ends of the queue.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::config::TRACE_BUFFER_SIZE;
use crate::process::mm::Access;
use crate::process::ExecContext;
use crate::syscall::{SyscallError, SyscallResult};
use crate::vfs::File;

/// Fixed-capacity circular byte queue.
pub struct TraceBuffer {
    mode: Access,
    data: Box<[u8]>,
    read_offset: usize,
    write_offset: usize,
    free: usize,
}

impl TraceBuffer {
    /// Allocate an empty ring of `capacity` bytes.
    pub fn with_capacity(mode: Access, capacity: usize) -> Result<Self, SyscallError> {
        let mut data = Vec::new();
        data.try_reserve_exact(capacity).map_err(|_| SyscallError::OutOfMemory)?;
        data.resize(capacity, 0);
        Ok(TraceBuffer {
            mode,
            data: data.into_boxed_slice(),
            read_offset: 0,
            write_offset: 0,
            free: capacity,
        })
    }

    pub fn mode(&self) -> Access {
        self.mode
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes that can still be appended.
    pub fn free(&self) -> usize {
        self.free
    }

    /// Bytes queued and not yet consumed.
    pub fn occupied(&self) -> usize {
        self.capacity() - self.free
    }

    pub fn is_empty(&self) -> bool {
        self.free == self.capacity()
    }

    pub fn readable(&self) -> bool {
        self.mode.contains(Access::READ)
    }

    pub fn writable(&self) -> bool {
        self.mode.contains(Access::WRITE)
    }

    /// Drop all queued bytes and rewind both cursors.
    pub fn reset(&mut self) {
        self.read_offset = 0;
        self.write_offset = 0;
        self.free = self.capacity();
    }

    /// Descriptor-level write: mode-gated append.
    pub fn write(&mut self, src: &[u8]) -> SyscallResult {
        if !self.writable() {
            return Err(SyscallError::InvalidState);
        }
        Ok(self.push(src) as u64)
    }

    /// Descriptor-level read: mode-gated consume.
    pub fn read(&mut self, dst: &mut [u8]) -> SyscallResult {
        if !self.readable() {
            return Err(SyscallError::InvalidState);
        }
        Ok(self.pop(dst) as u64)
    }

    /// Append as much of `src` as fits, wrapping at the capacity. Returns the
    /// number of bytes taken; a full buffer takes none.
    pub fn push(&mut self, src: &[u8]) -> usize {
        let count = src.len().min(self.free);
        if count == 0 {
            return 0;
        }
        let cap = self.capacity();
        let first = count.min(cap - self.write_offset);
        self.data[self.write_offset..self.write_offset + first].copy_from_slice(&src[..first]);
        self.data[..count - first].copy_from_slice(&src[first..count]);
        self.write_offset = (self.write_offset + count) % cap;
        self.free -= count;
        count
    }

    /// Consume up to `dst.len()` queued bytes, wrapping at the capacity.
    /// Returns the number of bytes delivered; an empty buffer delivers none.
    pub fn pop(&mut self, dst: &mut [u8]) -> usize {
        let count = dst.len().min(self.occupied());
        if count == 0 {
            return 0;
        }
        let cap = self.capacity();
        let first = count.min(cap - self.read_offset);
        dst[..first].copy_from_slice(&self.data[self.read_offset..self.read_offset + first]);
        dst[first..count].copy_from_slice(&self.data[..count - first]);
        self.read_offset = (self.read_offset + count) % cap;
        self.free += count;
        count
    }

    /// Append one whole word or nothing. The trap recorder uses this so a
    /// filling buffer can never leave a torn word behind.
    pub fn push_word(&mut self, word: u64) -> Result<(), SyscallError> {
        if self.free < 8 {
            return Err(SyscallError::InvalidState);
        }
        self.push(&word.to_ne_bytes());
        Ok(())
    }

    /// Consume one whole word, or `None` when fewer than 8 bytes are queued.
    pub fn pop_word(&mut self) -> Option<u64> {
        if self.occupied() < 8 {
            return None;
        }
        let mut raw = [0u8; 8];
        self.pop(&mut raw);
        Some(u64::from_ne_bytes(raw))
    }

    /// The next queued word without consuming it.
    pub fn peek_word(&self) -> Option<u64> {
        if self.occupied() < 8 {
            return None;
        }
        let cap = self.capacity();
        let mut raw = [0u8; 8];
        for (i, byte) in raw.iter_mut().enumerate() {
            *byte = self.data[(self.read_offset + i) % cap];
        }
        Some(u64::from_ne_bytes(raw))
    }
}

/// Create a trace buffer and install it at the lowest free descriptor.
///
/// `mode_bits` is 1 for read-only, 2 for write-only, 3 for read-write.
pub fn create_trace_buffer(ctx: &mut ExecContext, mode_bits: u64) -> SyscallResult {
    let mode = match mode_bits {
        1 => Access::READ,
        2 => Access::WRITE,
        3 => Access::READ | Access::WRITE,
        _ => return Err(SyscallError::InvalidArgument),
    };
    if ctx.files.is_full() {
        return Err(SyscallError::InvalidArgument);
    }
    let buffer = TraceBuffer::with_capacity(mode, TRACE_BUFFER_SIZE)?;
    let fd = ctx.files.install(File::trace(buffer))?;
    log::debug!("trace buffer: fd {} mode {:?}", fd, mode);
    Ok(fd as u64)
}
