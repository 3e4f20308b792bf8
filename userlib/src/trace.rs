//! Tracing control wrappers and event-stream decoding.
//!
//! The kernel records events as native-endian 64-bit words. A syscall event
//! is self-describing: the id word fixes how many argument words follow, so
//! [`SyscallEvents`] can walk a drained stream without extra context. A
//! function-trace stream is not self-describing (the argument and backtrace
//! counts depend on how the function was registered), so it is exposed as a
//! plain word iterator via [`words`].

use crate::syscall::{
    syscall0, syscall1, syscall2, syscall3, syscall4, SyscallNumber, SyscallResult,
};

// ── Control constants (kernel ABI) ──

/// Trace buffer readable by its owner.
pub const TRACE_READ: u64 = 1;
/// Trace buffer writable by its owner.
pub const TRACE_WRITE: u64 = 2;
/// Trace buffer readable and writable.
pub const TRACE_RDWR: u64 = 3;

/// Record every system call.
pub const TRACE_FULL: u64 = 1;
/// Record only watched system calls.
pub const TRACE_FILTERED: u64 = 2;

/// Add a syscall to the watch list.
pub const WATCH_ADD: u64 = 1;
/// Remove a syscall from the watch list.
pub const WATCH_REMOVE: u64 = 2;

/// Function-tracer actions.
pub const FTRACE_REGISTER: u64 = 1;
pub const FTRACE_REMOVE: u64 = 2;
pub const FTRACE_ENABLE: u64 = 3;
pub const FTRACE_DISABLE: u64 = 4;
pub const FTRACE_BACKTRACE_ON: u64 = 5;
pub const FTRACE_BACKTRACE_OFF: u64 = 6;

/// Event delimiter in a raw function-trace sink - must match the kernel's
/// stack-end sentinel. Only visible when reading the sink with plain
/// `read`; `read_ftrace` strips it.
pub const TRACE_END: u64 = 0xDEAD_BEEF_DEAD_BEEF;

// ── Syscall wrappers ──

/// Create a trace buffer, returning its file descriptor.
pub fn create_trace_buffer(mode: u64) -> SyscallResult {
    unsafe { syscall1(SyscallNumber::CreateTraceBuffer, mode) }
}

/// Edit the syscall watch list.
pub fn strace(nr: SyscallNumber, action: u64) -> SyscallResult {
    unsafe { syscall2(SyscallNumber::Strace, nr as u64, action) }
}

/// Arm syscall tracing into the trace buffer at `fd`.
pub fn start_strace(fd: i32, mode: u64) -> SyscallResult {
    unsafe { syscall2(SyscallNumber::StartStrace, fd as u64, mode) }
}

/// Disarm syscall tracing.
pub fn end_strace() -> SyscallResult {
    unsafe { syscall0(SyscallNumber::EndStrace) }
}

/// Drain up to `count` recorded syscall events into `buf`. Returns the
/// number of bytes delivered.
pub fn read_strace(fd: i32, buf: &mut [u8], count: u64) -> SyscallResult {
    unsafe { syscall3(SyscallNumber::ReadStrace, fd as u64, buf.as_mut_ptr() as u64, count) }
}

/// Control function tracing for the function at `addr`.
pub fn ftrace(addr: u64, action: u64, nargs: u64, fd: i32) -> SyscallResult {
    unsafe { syscall4(SyscallNumber::Ftrace, addr, action, nargs, fd as u64) }
}

/// Drain up to `count` recorded function-trace events into `buf`. Returns
/// the number of bytes delivered.
pub fn read_ftrace(fd: i32, buf: &mut [u8], count: u64) -> SyscallResult {
    unsafe { syscall3(SyscallNumber::ReadFtrace, fd as u64, buf.as_mut_ptr() as u64, count) }
}

// ── Stream decoding ──

/// Argument words per syscall event - must match the kernel's table.
pub fn arg_count(id: u64) -> Option<usize> {
    let count = match id {
        1 | 2 | 3 | 4 | 5 | 6 | 10 | 11 | 13 | 14 | 28 => 0,
        7 | 12 | 16 | 20 | 25 => 1,
        8 | 9 | 15 | 21 | 23 | 26 | 27 => 2,
        17 | 18 | 19 | 24 | 29 | 31 => 3,
        22 | 30 => 4,
        _ => return None,
    };
    Some(count)
}

fn word(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[..8]);
    u64::from_ne_bytes(raw)
}

/// One decoded syscall event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyscallEvent {
    pub id: u64,
    args: [u64; 4],
    argc: usize,
}

impl SyscallEvent {
    /// The recorded argument words.
    pub fn args(&self) -> &[u64] {
        &self.args[..self.argc]
    }
}

/// Iterator over a drained syscall-event stream.
///
/// Stops at the end of the buffer, at a truncated tail, or at a word that
/// is not a known syscall id.
pub struct SyscallEvents<'a> {
    bytes: &'a [u8],
}

impl<'a> SyscallEvents<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        SyscallEvents { bytes }
    }
}

impl Iterator for SyscallEvents<'_> {
    type Item = SyscallEvent;

    fn next(&mut self) -> Option<SyscallEvent> {
        if self.bytes.len() < 8 {
            return None;
        }
        let id = word(self.bytes);
        let argc = arg_count(id)?;
        let len = 8 + argc * 8;
        if self.bytes.len() < len {
            return None;
        }
        let mut args = [0u64; 4];
        for (slot, arg) in args.iter_mut().take(argc).enumerate() {
            *arg = word(&self.bytes[8 + slot * 8..]);
        }
        self.bytes = &self.bytes[len..];
        Some(SyscallEvent { id, args, argc })
    }
}

/// Iterate the 64-bit words of a drained function-trace stream.
///
/// Segmenting the words into events is up to the caller, who knows each
/// function's registered argument count and backtrace setting.
pub fn words(bytes: &[u8]) -> impl Iterator<Item = u64> + '_ {
    bytes.chunks_exact(8).map(word)
}
