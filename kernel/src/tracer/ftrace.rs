//! Dynamic function-call tracing.
//!
//! A process registers a function's entry address together with an argument
//! count and a sink trace buffer. Enabling the entry overwrites its first
//! bytes with a trapping opcode; the fault handler then records the call
//! (see [`crate::tracer::trap`]) and resumes past the patch. Disabling puts
//! the saved bytes back. The registry keeps the original bytes so patching
//! round-trips exactly.
//!
//! Patching assumes the process is not executing the instrumented entry at
//! that moment; callers toggle tracing from the same thread that runs the
//! traced code, which gives that for free.

use alloc::boxed::Box;

use hashbrown::HashMap;

use crate::config::{FTRACE_MAX_ARGS, FTRACE_MAX_ENTRIES, PATCH_SIZE, STACK_END, TRAP_OPCODE};
use crate::process::usermem::UserMemory;
use crate::process::ExecContext;
use crate::syscall::{SyscallError, SyscallResult};
use crate::tracer::drain_word;
use crate::vfs::fd::fd_from_raw;
use crate::vfs::File;

/// Control actions for the function tracer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum FtraceAction {
    Register = 1,
    Remove = 2,
    Enable = 3,
    Disable = 4,
    EnableBacktrace = 5,
    DisableBacktrace = 6,
}

impl TryFrom<u64> for FtraceAction {
    type Error = SyscallError;

    fn try_from(raw: u64) -> Result<Self, SyscallError> {
        match raw {
            1 => Ok(FtraceAction::Register),
            2 => Ok(FtraceAction::Remove),
            3 => Ok(FtraceAction::Enable),
            4 => Ok(FtraceAction::Disable),
            5 => Ok(FtraceAction::EnableBacktrace),
            6 => Ok(FtraceAction::DisableBacktrace),
            _ => Err(SyscallError::InvalidArgument),
        }
    }
}

/// One instrumented function.
pub struct FtraceEntry {
    /// Entry address of the traced function.
    pub addr: u64,
    /// Argument registers recorded per call.
    pub arg_count: usize,
    /// Descriptor of the sink trace buffer.
    pub sink_fd: i32,
    /// Whether trap events carry a return-address walk.
    pub backtrace: bool,
    /// The entry bytes the trap opcode replaces.
    saved: [u8; PATCH_SIZE],
    /// Whether the trap opcode is currently installed.
    patched: bool,
}

impl FtraceEntry {
    pub fn is_enabled(&self) -> bool {
        self.patched
    }
}

/// Per-process function-tracer registry, keyed by entry address.
pub struct FtraceState {
    entries: HashMap<u64, FtraceEntry>,
}

impl FtraceState {
    pub fn new() -> Self {
        FtraceState { entries: HashMap::new() }
    }

    pub fn get(&self, addr: u64) -> Option<&FtraceEntry> {
        self.entries.get(&addr)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Control an instrumented function (the ftrace syscall). `nargs` and `fd`
/// only matter for registration.
pub fn ftrace(ctx: &mut ExecContext, addr: u64, action: u64, nargs: u64, fd: u64) -> SyscallResult {
    let action = FtraceAction::try_from(action)?;
    match action {
        FtraceAction::Register => register(ctx, addr, nargs, fd)?,
        FtraceAction::Remove => remove(ctx, addr)?,
        FtraceAction::Enable => enable(ctx, addr)?,
        FtraceAction::Disable => disable(ctx, addr)?,
        FtraceAction::EnableBacktrace => set_backtrace(ctx, addr, true)?,
        FtraceAction::DisableBacktrace => set_backtrace(ctx, addr, false)?,
    }
    Ok(0)
}

fn register(ctx: &mut ExecContext, addr: u64, nargs: u64, fd: u64) -> Result<(), SyscallError> {
    if nargs as usize > FTRACE_MAX_ARGS {
        return Err(SyscallError::InvalidArgument);
    }
    let fd = fd_from_raw(fd)?;

    let ExecContext { mem, files, ftrace, .. } = ctx;
    let state = ftrace.get_or_insert_with(|| Box::new(FtraceState::new()));
    if state.entries.len() >= FTRACE_MAX_ENTRIES {
        return Err(SyscallError::InvalidArgument);
    }
    if state.entries.contains_key(&addr) {
        return Err(SyscallError::InvalidArgument);
    }
    state.entries.try_reserve(1).map_err(|_| SyscallError::OutOfMemory)?;

    let buffer = files
        .get_mut(fd)
        .and_then(File::trace_buffer_mut)
        .ok_or(SyscallError::InvalidArgument)?;
    // The sink starts over for this function's event stream.
    buffer.reset();

    let mut saved = [0u8; PATCH_SIZE];
    mem.read_bytes(addr, &mut saved);

    state.entries.insert(
        addr,
        FtraceEntry {
            addr,
            arg_count: nargs as usize,
            sink_fd: fd,
            backtrace: false,
            saved,
            patched: false,
        },
    );
    log::debug!("ftrace: registered {:#x} ({} args, fd {})", addr, nargs, fd);
    Ok(())
}

fn remove(ctx: &mut ExecContext, addr: u64) -> Result<(), SyscallError> {
    let ExecContext { mem, ftrace, .. } = ctx;
    let state = ftrace.as_deref_mut().ok_or(SyscallError::InvalidArgument)?;
    let entry = state.entries.get(&addr).ok_or(SyscallError::InvalidArgument)?;
    if entry.patched {
        let saved = entry.saved;
        mem.write_bytes(addr, &saved);
    }
    state.entries.remove(&addr);
    log::debug!("ftrace: removed {:#x}", addr);
    Ok(())
}

fn enable(ctx: &mut ExecContext, addr: u64) -> Result<(), SyscallError> {
    let ExecContext { mem, ftrace, .. } = ctx;
    let entry = ftrace
        .as_deref_mut()
        .and_then(|state| state.entries.get_mut(&addr))
        .ok_or(SyscallError::InvalidArgument)?;
    // Re-enabling must not capture the trap opcode as the saved bytes.
    if !entry.patched {
        mem.write_bytes(addr, &TRAP_OPCODE);
        entry.patched = true;
    }
    Ok(())
}

fn disable(ctx: &mut ExecContext, addr: u64) -> Result<(), SyscallError> {
    let ExecContext { mem, ftrace, .. } = ctx;
    let entry = ftrace
        .as_deref_mut()
        .and_then(|state| state.entries.get_mut(&addr))
        .ok_or(SyscallError::InvalidArgument)?;
    if entry.patched {
        mem.write_bytes(addr, &entry.saved);
        entry.patched = false;
    }
    Ok(())
}

fn set_backtrace(ctx: &mut ExecContext, addr: u64, on: bool) -> Result<(), SyscallError> {
    let ExecContext { mem, ftrace, .. } = ctx;
    let entry = ftrace
        .as_deref_mut()
        .and_then(|state| state.entries.get_mut(&addr))
        .ok_or(SyscallError::InvalidArgument)?;
    if on {
        if !entry.patched {
            mem.read_bytes(addr, &mut entry.saved);
            mem.write_bytes(addr, &TRAP_OPCODE);
            entry.patched = true;
        }
        entry.backtrace = true;
    } else {
        if entry.patched {
            mem.write_bytes(addr, &entry.saved);
            entry.patched = false;
        }
        entry.backtrace = false;
    }
    Ok(())
}

/// Drain and decode up to `max_events` function-trace events into user
/// memory at `addr`. Returns the number of bytes delivered.
///
/// Each event is the function address, then the recorded words up to the
/// delimiter. The delimiter is consumed but not delivered. A tail cut short
/// before its delimiter (the sink filled mid-event) ends the drain.
pub fn read_ftrace(ctx: &mut ExecContext, fd: u64, addr: u64, max_events: u64) -> SyscallResult {
    let fd = fd_from_raw(fd)?;
    let ExecContext { mm, mem, files, .. } = ctx;
    let buffer = files
        .get_mut(fd)
        .and_then(File::trace_buffer_mut)
        .ok_or(SyscallError::InvalidArgument)?;

    let mut filled = 0u64;
    'events: for _ in 0..max_events {
        let Some(_) = drain_word(buffer, mm, mem.as_mut(), addr + filled)? else {
            break;
        };
        filled += 8;
        loop {
            match buffer.peek_word() {
                None => break 'events,
                Some(word) if word == STACK_END => {
                    let _ = buffer.pop_word();
                    break;
                }
                Some(_) => {
                    let Some(_) = drain_word(buffer, mm, mem.as_mut(), addr + filled)? else {
                        break 'events;
                    };
                    filled += 8;
                }
            }
        }
    }
    Ok(filled)
}
