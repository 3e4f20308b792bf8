//! Per-process system call tracing.
//!
//! A process arms tracing by pointing the tracer at one of its trace-buffer
//! descriptors. From then on the dispatch layer hands every incoming call to
//! [`on_syscall_entry`], which appends one event per recorded call:
//!
//! ```text
//! [ syscall id : u64 ][ arg word : u64 ] * arg_count(id)
//! ```
//!
//! FULL mode records every call, FILTERED only those on the watch list. The
//! end-of-trace control call is never recorded. Recording must never fail
//! the traced call, so every skip condition in the hook is silent and a sink
//! without room simply truncates the event.

use alloc::vec::Vec;

use crate::process::ExecContext;
use crate::syscall::{self, SyscallError, SyscallNumber, SyscallResult};
use crate::tracer::drain_word;
use crate::vfs::fd::fd_from_raw;
use crate::vfs::File;

/// Scope of syscall recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum TraceMode {
    /// Record every syscall.
    Full = 1,
    /// Record only watched syscalls.
    Filtered = 2,
}

impl TryFrom<u64> for TraceMode {
    type Error = SyscallError;

    fn try_from(raw: u64) -> Result<Self, SyscallError> {
        match raw {
            1 => Ok(TraceMode::Full),
            2 => Ok(TraceMode::Filtered),
            _ => Err(SyscallError::InvalidArgument),
        }
    }
}

/// Watch-list edit actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum WatchAction {
    Add = 1,
    Remove = 2,
}

impl TryFrom<u64> for WatchAction {
    type Error = SyscallError;

    fn try_from(raw: u64) -> Result<Self, SyscallError> {
        match raw {
            1 => Ok(WatchAction::Add),
            2 => Ok(WatchAction::Remove),
            _ => Err(SyscallError::InvalidArgument),
        }
    }
}

/// Largest encoded event: the identifier plus four argument words.
pub const MAX_EVENT_BYTES: usize = 40;

/// Per-process syscall-tracer registry.
pub struct StraceState {
    /// Watched identifiers in insertion order.
    watched: Vec<SyscallNumber>,
    /// Sink descriptor and mode while armed.
    sink: Option<(i32, TraceMode)>,
}

impl StraceState {
    pub fn new() -> Self {
        StraceState { watched: Vec::new(), sink: None }
    }

    pub fn is_armed(&self) -> bool {
        self.sink.is_some()
    }

    pub fn watched(&self) -> &[SyscallNumber] {
        &self.watched
    }
}

/// Edit the watch list. The list may be edited before or after arming.
pub fn strace(ctx: &mut ExecContext, nr: u64, action: u64) -> SyscallResult {
    let nr = SyscallNumber::try_from(nr).map_err(|_| SyscallError::InvalidArgument)?;
    let action = WatchAction::try_from(action)?;
    let state = ctx.strace_mut();
    match action {
        WatchAction::Add => {
            if state.watched.contains(&nr) {
                return Err(SyscallError::InvalidArgument);
            }
            state.watched.try_reserve(1).map_err(|_| SyscallError::OutOfMemory)?;
            state.watched.push(nr);
        }
        WatchAction::Remove => {
            let pos = state
                .watched
                .iter()
                .position(|watched| *watched == nr)
                .ok_or(SyscallError::InvalidArgument)?;
            state.watched.remove(pos);
        }
    }
    log::debug!("strace: {:?} {:?}", action, nr);
    Ok(0)
}

/// Arm tracing into the trace buffer at `fd`. Re-arming replaces the sink
/// and mode.
pub fn start_strace(ctx: &mut ExecContext, fd: u64, mode: u64) -> SyscallResult {
    let fd = fd_from_raw(fd)?;
    let mode = TraceMode::try_from(mode)?;
    let is_trace = ctx.files.get(fd).map_or(false, File::is_trace);
    if !is_trace {
        return Err(SyscallError::InvalidArgument);
    }
    ctx.strace_mut().sink = Some((fd, mode));
    log::debug!("strace: armed fd {} {:?}", fd, mode);
    Ok(0)
}

/// Disarm tracing and clear the watch list. The sink descriptor stays open;
/// recorded events remain readable.
pub fn end_strace(ctx: &mut ExecContext) -> SyscallResult {
    let state = ctx.strace.as_deref_mut().ok_or(SyscallError::InvalidState)?;
    if state.sink.is_none() {
        return Err(SyscallError::InvalidState);
    }
    state.sink = None;
    state.watched = Vec::new();
    log::debug!("strace: disarmed");
    Ok(0)
}

/// Record one syscall entry into the armed sink, if any.
///
/// Runs before the call itself. Never fails: a disarmed tracer, an unknown
/// number, a filtered-out call, a stale sink descriptor or a wrong-mode sink
/// all skip recording silently.
pub fn on_syscall_entry(ctx: &mut ExecContext, nr: u64, args: [u64; 4]) {
    let Ok(id) = SyscallNumber::try_from(nr) else {
        return;
    };
    if id == SyscallNumber::EndStrace {
        return;
    }
    let Some(state) = ctx.strace.as_deref() else {
        return;
    };
    let Some((fd, mode)) = state.sink else {
        return;
    };
    if mode == TraceMode::Filtered && !state.watched.contains(&id) {
        return;
    }

    let argc = syscall::arg_count(id);
    let mut event = [0u8; MAX_EVENT_BYTES];
    event[..8].copy_from_slice(&nr.to_ne_bytes());
    for (slot, arg) in args.iter().take(argc).enumerate() {
        let at = 8 + slot * 8;
        event[at..at + 8].copy_from_slice(&arg.to_ne_bytes());
    }
    let len = 8 + argc * 8;

    let Some(buffer) = ctx.files.get_mut(fd).and_then(File::trace_buffer_mut) else {
        return;
    };
    if !buffer.writable() {
        return;
    }
    let written = buffer.push(&event[..len]);
    if written < len {
        log::debug!("strace: sink full, event truncated ({}/{} bytes)", written, len);
    }
    #[cfg(feature = "trace-events")]
    log::trace!(
        "strace: recorded {} ({} args)",
        syscall::syscall_name(nr).unwrap_or("?"),
        argc
    );
}

/// Drain and decode up to `max_events` recorded calls into user memory at
/// `addr`. Returns the number of bytes delivered.
///
/// Stops early on an empty sink, also mid-event when a truncated tail runs
/// out. A word that is not a known syscall id where an id is due means the
/// stream lost sync, which is an error.
pub fn read_strace(ctx: &mut ExecContext, fd: u64, addr: u64, max_events: u64) -> SyscallResult {
    let fd = fd_from_raw(fd)?;
    let ExecContext { mm, mem, files, .. } = ctx;
    let buffer = files
        .get_mut(fd)
        .and_then(File::trace_buffer_mut)
        .ok_or(SyscallError::InvalidArgument)?;
    if !buffer.readable() {
        return Err(SyscallError::InvalidState);
    }

    let mut filled = 0u64;
    for _ in 0..max_events {
        let Some(id_word) = drain_word(buffer, mm, mem.as_mut(), addr + filled)? else {
            break;
        };
        filled += 8;
        let id = SyscallNumber::try_from(id_word).map_err(|_| SyscallError::InvalidArgument)?;
        for _ in 0..syscall::arg_count(id) {
            match drain_word(buffer, mm, mem.as_mut(), addr + filled)? {
                Some(_) => filled += 8,
                None => return Ok(filled),
            }
        }
    }
    Ok(filled)
}
