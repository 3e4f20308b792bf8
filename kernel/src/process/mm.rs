//! Process memory layout.
//!
//! Tracks where a process's fixed segments and mmap areas live so the kernel
//! can vet user-supplied addresses before touching them. This is layout
//! metadata only; actual page tables are owned by the paging layer.

use alloc::vec::Vec;

use bitflags::bitflags;

bitflags! {
    /// Access rights for a memory range.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Access: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const EXEC = 1 << 2;
    }
}

/// The fixed segments every process image has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum SegmentKind {
    Code = 0,
    Rodata = 1,
    Data = 2,
    Stack = 3,
}

/// Number of fixed segments.
pub const SEGMENT_COUNT: usize = 4;

/// One fixed segment of the process image.
///
/// For code, rodata and data the populated part is `[start, next_free)` and
/// `next_free` advances as the loader fills the segment. The stack grows
/// downward inside `[start, end)`, so for it the whole reservation counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub start: u64,
    pub end: u64,
    pub next_free: u64,
}

impl Segment {
    pub const fn empty() -> Self {
        Segment { start: 0, end: 0, next_free: 0 }
    }
}

/// One mmap-created area, `[start, end)` with its own access rights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmArea {
    pub start: u64,
    pub end: u64,
    pub access: Access,
}

/// Memory layout of one process.
pub struct AddressSpace {
    pub segments: [Segment; SEGMENT_COUNT],
    /// Mmap areas, non-overlapping, maintained by the mapping layer.
    pub vm_areas: Vec<VmArea>,
}

impl AddressSpace {
    pub fn new() -> Self {
        AddressSpace { segments: [Segment::empty(); SEGMENT_COUNT], vm_areas: Vec::new() }
    }

    pub fn segment(&self, kind: SegmentKind) -> &Segment {
        &self.segments[kind as usize]
    }

    pub fn segment_mut(&mut self, kind: SegmentKind) -> &mut Segment {
        &mut self.segments[kind as usize]
    }

    pub fn add_area(&mut self, area: VmArea) {
        self.vm_areas.push(area);
    }

    /// Check that `[addr, addr + len)` lies inside one region of this layout
    /// and that the region permits `access`.
    ///
    /// `access` is a single right, the one the caller is about to exercise.
    /// Executable ranges are readable; rodata is read-only; data and stack
    /// allow reads and writes. For mmap areas the first area containing the
    /// range decides, and only reads and writes can be granted there. A range
    /// that spans two regions fails even if both would allow it.
    pub fn valid_range(&self, addr: u64, len: usize, access: Access) -> bool {
        if len == 0 {
            return true;
        }
        let last = match addr.checked_add(len as u64 - 1) {
            Some(last) => last,
            None => return false,
        };

        let code = self.segment(SegmentKind::Code);
        if addr >= code.start && last < code.next_free {
            return access == Access::READ || access == Access::EXEC;
        }

        let rodata = self.segment(SegmentKind::Rodata);
        if addr >= rodata.start && last < rodata.next_free {
            return access == Access::READ;
        }

        let data = self.segment(SegmentKind::Data);
        if addr >= data.start && last < data.next_free {
            return access == Access::READ || access == Access::WRITE;
        }

        let stack = self.segment(SegmentKind::Stack);
        if addr >= stack.start && last < stack.end {
            return access == Access::READ || access == Access::WRITE;
        }

        for area in &self.vm_areas {
            if addr >= area.start && last < area.end {
                return (access == Access::READ && area.access.contains(Access::READ))
                    || (access == Access::WRITE && area.access.contains(Access::WRITE));
            }
        }

        false
    }
}
