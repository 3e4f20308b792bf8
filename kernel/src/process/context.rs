//! Per-process execution context.

use alloc::boxed::Box;

use core::sync::atomic::{AtomicU64, Ordering};

use crate::process::mm::AddressSpace;
use crate::process::usermem::UserMemory;
use crate::tracer::{FtraceState, StraceState};
use crate::vfs::FdTable;

/// Process identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(pub u64);

static NEXT_PID: AtomicU64 = AtomicU64::new(1);

impl ProcessId {
    /// Allocate the next free identifier.
    pub fn next() -> Self {
        ProcessId(NEXT_PID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Everything a system call needs from the calling process.
///
/// Syscall and trap entry paths borrow this mutably for their whole run, so
/// none of the tracer state needs its own locking. Both tracer registries
/// start out absent and are created the first time they are touched.
pub struct ExecContext {
    pub pid: ProcessId,
    /// Memory layout metadata, consulted before user-memory copies.
    pub mm: AddressSpace,
    /// Access to the process's user address space.
    pub mem: Box<dyn UserMemory + Send>,
    /// Open-file table.
    pub files: FdTable,
    /// Syscall-tracer registry.
    pub strace: Option<Box<StraceState>>,
    /// Function-tracer registry.
    pub ftrace: Option<Box<FtraceState>>,
}

impl ExecContext {
    /// Fresh context over the given user-memory accessor.
    pub fn new(mem: Box<dyn UserMemory + Send>) -> Self {
        ExecContext {
            pid: ProcessId::next(),
            mm: AddressSpace::new(),
            mem,
            files: FdTable::new(),
            strace: None,
            ftrace: None,
        }
    }

    /// The syscall-tracer registry, created on first use.
    pub fn strace_mut(&mut self) -> &mut StraceState {
        self.strace.get_or_insert_with(|| Box::new(StraceState::new()))
    }

    /// The function-tracer registry, created on first use.
    pub fn ftrace_mut(&mut self) -> &mut FtraceState {
        self.ftrace.get_or_insert_with(|| Box::new(FtraceState::new()))
    }
}
