//! Process control wrappers.

use crate::syscall::{syscall0, syscall1, SyscallNumber, SyscallResult};

/// Terminate the calling process.
pub fn exit(code: u64) -> ! {
    unsafe {
        let _ = syscall1(SyscallNumber::Exit, code);
    }
    // The kernel does not return from exit.
    loop {
        core::hint::spin_loop();
    }
}

/// Process id of the caller.
pub fn getpid() -> SyscallResult {
    unsafe { syscall0(SyscallNumber::GetPid) }
}

/// Parent process id of the caller.
pub fn getppid() -> SyscallResult {
    unsafe { syscall0(SyscallNumber::GetPpid) }
}

/// Sleep for `ticks` timer ticks.
pub fn sleep(ticks: u64) -> SyscallResult {
    unsafe { syscall1(SyscallNumber::Sleep, ticks) }
}
