//! Kernel tracing subsystem.
//!
//! Three cooperating pieces, all scoped to a single process:
//!
//! * [`buffer`]: circular trace buffers behind file descriptors, the sink
//!   for every recorded event.
//! * [`strace`]: records system call entries, driven by the dispatch layer.
//! * [`ftrace`] and [`trap`]: record function calls by patching function
//!   entries with a trapping opcode and resuming past it.
//!
//! Nothing here locks. All state hangs off the process's [`ExecContext`],
//! which syscall and fault entry borrow exclusively, so a process cannot
//! race its own tracer.
//!
//! [`ExecContext`]: crate::process::ExecContext

pub mod buffer;
pub mod ftrace;
pub mod strace;
pub mod trap;

pub use buffer::TraceBuffer;
pub use ftrace::{FtraceAction, FtraceEntry, FtraceState};
pub use strace::{StraceState, TraceMode, WatchAction};
pub use trap::{Resume, TrapFrame};

use crate::process::mm::{Access, AddressSpace};
use crate::process::usermem::UserMemory;
use crate::syscall::SyscallError;

/// Move one queued word from `buffer` to user memory at `dst`.
///
/// The destination is validated before anything is consumed, so on a bad
/// destination the queued word survives for a later, correct read. Returns
/// `Ok(None)` when fewer than a whole word is queued.
pub(crate) fn drain_word(
    buffer: &mut TraceBuffer,
    mm: &AddressSpace,
    mem: &mut dyn UserMemory,
    dst: u64,
) -> Result<Option<u64>, SyscallError> {
    if !mm.valid_range(dst, 8, Access::WRITE) {
        return Err(SyscallError::BadUserMemory);
    }
    match buffer.pop_word() {
        Some(word) => {
            mem.write_u64(dst, word);
            Ok(Some(word))
        }
        None => Ok(None),
    }
}
