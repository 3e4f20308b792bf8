//! User address-space access.
//!
//! Everything the tracer reads from or writes into user memory goes through
//! [`UserMemory`], so the same code paths run against real process memory in
//! the kernel and against an in-memory image in tests. Callers are expected
//! to vet ranges with [`AddressSpace::valid_range`] first unless the address
//! was derived by the kernel itself (trap-time register state).
//!
//! [`AddressSpace::valid_range`]: crate::process::mm::AddressSpace::valid_range

use alloc::vec;
use alloc::vec::Vec;

/// Byte-level access to a process's user address space.
pub trait UserMemory {
    /// Copy `out.len()` bytes out of user memory at `addr`.
    fn read_bytes(&self, addr: u64, out: &mut [u8]);

    /// Copy `data` into user memory at `addr`.
    fn write_bytes(&mut self, addr: u64, data: &[u8]);

    /// Read one native-endian word.
    fn read_u64(&self, addr: u64) -> u64 {
        let mut raw = [0u8; 8];
        self.read_bytes(addr, &mut raw);
        u64::from_ne_bytes(raw)
    }

    /// Write one native-endian word.
    fn write_u64(&mut self, addr: u64, value: u64) {
        self.write_bytes(addr, &value.to_ne_bytes());
    }
}

/// Access through the live page tables of the current address space.
pub struct DirectMemory;

impl UserMemory for DirectMemory {
    fn read_bytes(&self, addr: u64, out: &mut [u8]) {
        // SAFETY: the caller vetted the range or took it from trap state.
        unsafe { core::ptr::copy_nonoverlapping(addr as *const u8, out.as_mut_ptr(), out.len()) };
    }

    fn write_bytes(&mut self, addr: u64, data: &[u8]) {
        // SAFETY: as above.
        unsafe { core::ptr::copy_nonoverlapping(data.as_ptr(), addr as *mut u8, data.len()) };
    }
}

/// A user address space backed by an owned byte image at a fixed base.
///
/// Test double for [`DirectMemory`]. Out-of-image accesses panic, which is
/// the failure mode a test wants to see.
pub struct SliceMemory {
    base: u64,
    bytes: Vec<u8>,
}

impl SliceMemory {
    /// Zero-filled image of `size` bytes, addressed from `base`.
    pub fn new(base: u64, size: usize) -> Self {
        SliceMemory { base, bytes: vec![0; size] }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn offset(&self, addr: u64) -> usize {
        (addr - self.base) as usize
    }
}

impl UserMemory for SliceMemory {
    fn read_bytes(&self, addr: u64, out: &mut [u8]) {
        let lo = self.offset(addr);
        out.copy_from_slice(&self.bytes[lo..lo + out.len()]);
    }

    fn write_bytes(&mut self, addr: u64, data: &[u8]) {
        let lo = self.offset(addr);
        self.bytes[lo..lo + data.len()].copy_from_slice(data);
    }
}
