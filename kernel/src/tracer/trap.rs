//! Trap entry for instrumented functions.
//!
//! When a process executes a patched function entry, the invalid-opcode
//! fault lands here with the faulting register file. The handler records one
//! event into the function's sink:
//!
//! ```text
//! [ function address ][ arg regs... ][ return addresses... ][ delimiter ]
//! ```
//!
//! the backtrace part only when enabled for the entry. It then simulates the
//! two prologue instructions the patch covers (push rbp; mov rbp, rsp) and
//! hands back the state to resume at the first unpatched instruction.
//!
//! Recording is whole words only and lossy by rejection: once the sink
//! cannot take the next word the trap fails and the event stays as recorded
//! so far. The decoder treats a missing delimiter as end of stream.

use crate::config::{PATCH_SIZE, STACK_END};
use crate::process::usermem::UserMemory;
use crate::process::ExecContext;
use crate::syscall::SyscallError;
use crate::vfs::File;

/// General-register snapshot captured at the fault.
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct TrapFrame {
    pub rax: u64,
    pub rbx: u64,
    pub rcx: u64,
    pub rdx: u64,
    pub rsi: u64,
    pub rdi: u64,
    pub rbp: u64,
    pub r8: u64,
    pub r9: u64,
    pub r10: u64,
    pub r11: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
    pub rip: u64,
    pub rsp: u64,
    pub rflags: u64,
}

impl TrapFrame {
    /// Argument registers in calling-convention order.
    pub fn arg_regs(&self) -> [u64; 6] {
        [self.rdi, self.rsi, self.rdx, self.rcx, self.r8, self.r9]
    }
}

/// Register state to load when resuming the trapped process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resume {
    pub rip: u64,
    pub rsp: u64,
    pub rbp: u64,
}

/// Record a function-entry trap and compute the resume state.
///
/// An error here means the fault was not a tracer trap after all (no
/// registry, unknown address), the sink descriptor went bad, or the sink ran
/// out of space mid-event; the caller escalates it as a real fault against
/// the process.
pub fn handle_trap(ctx: &mut ExecContext, frame: &TrapFrame) -> Result<Resume, SyscallError> {
    let ExecContext { mem, files, ftrace, .. } = ctx;
    let entry = ftrace
        .as_deref()
        .and_then(|state| state.get(frame.rip))
        .ok_or(SyscallError::InvalidState)?;
    let buffer = files
        .get_mut(entry.sink_fd)
        .and_then(File::trace_buffer_mut)
        .ok_or(SyscallError::InvalidState)?;

    let recorded: Result<(), SyscallError> = (|| {
        buffer.push_word(entry.addr)?;
        for &reg in frame.arg_regs().iter().take(entry.arg_count) {
            buffer.push_word(reg)?;
        }
        if entry.backtrace {
            buffer.push_word(frame.rip)?;
            // Walk the saved-rbp chain. The first return address sits at the
            // faulting rsp because the patched push has not happened yet.
            let mut ret = mem.read_u64(frame.rsp);
            let mut fp = frame.rbp;
            while ret != STACK_END {
                buffer.push_word(ret)?;
                ret = mem.read_u64(fp + 8);
                fp = mem.read_u64(fp);
            }
        }
        buffer.push_word(STACK_END)
    })();
    if let Err(err) = recorded {
        log::debug!("ftrace: sink full at {:#x}, event cut short", frame.rip);
        return Err(err);
    }

    // Simulate the patched-over prologue: push rbp, then mov rbp, rsp.
    let rsp = frame.rsp - 8;
    mem.write_u64(rsp, frame.rbp);
    Ok(Resume { rip: frame.rip + PATCH_SIZE as u64, rsp, rbp: rsp })
}
