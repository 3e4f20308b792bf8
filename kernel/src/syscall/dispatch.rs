//! Tracer-owned system call routing.
//!
//! The kernel's syscall entry calls [`dispatch`] first. It runs the strace
//! entry hook for every call, then handles the calls this subsystem owns
//! and returns `None` for the rest, which the caller routes to their own
//! subsystems. Results fold to the raw ABI value: the success value, or the
//! error code's negative discriminant.

use crate::process::ExecContext;
use crate::tracer::{buffer, ftrace, strace};
use crate::vfs::fd;

use super::{syscall_name, SyscallContext, SyscallNumber, SyscallResult};

/// Route one system call through the tracing subsystem.
pub fn dispatch(ctx: &mut ExecContext, call: &SyscallContext) -> Option<i64> {
    strace::on_syscall_entry(ctx, call.num, call.args());

    let nr = SyscallNumber::try_from(call.num).ok()?;
    let result: SyscallResult = match nr {
        SyscallNumber::Read => fd::read(ctx, call.arg1, call.arg2, call.arg3),
        SyscallNumber::Write => fd::write(ctx, call.arg1, call.arg2, call.arg3),
        SyscallNumber::Close => fd::close(ctx, call.arg1),
        SyscallNumber::Lseek => fd::lseek(ctx, call.arg1, call.arg2, call.arg3),
        SyscallNumber::CreateTraceBuffer => buffer::create_trace_buffer(ctx, call.arg1),
        SyscallNumber::Strace => strace::strace(ctx, call.arg1, call.arg2),
        SyscallNumber::StartStrace => strace::start_strace(ctx, call.arg1, call.arg2),
        SyscallNumber::EndStrace => strace::end_strace(ctx),
        SyscallNumber::ReadStrace => strace::read_strace(ctx, call.arg1, call.arg2, call.arg3),
        SyscallNumber::Ftrace => {
            ftrace::ftrace(ctx, call.arg1, call.arg2, call.arg3, call.arg4)
        }
        SyscallNumber::ReadFtrace => ftrace::read_ftrace(ctx, call.arg1, call.arg2, call.arg3),
        _ => return None,
    };

    if let Err(err) = result {
        log::debug!(
            "syscall {} failed: {:?}",
            syscall_name(call.num).unwrap_or("?"),
            err
        );
    }
    Some(match result {
        Ok(value) => value as i64,
        Err(err) => err as i64,
    })
}
