//! Raw system call interface.
//!
//! The low-level system call mechanism using the x86_64 `syscall`
//! instruction. Arguments travel in rdi, rsi, rdx and r10; the number in
//! rax; the result comes back in rax.

use core::arch::asm;

/// System call numbers - must match the kernel's SyscallNumber enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum SyscallNumber {
    // Process management (1-14)
    Exit = 1,
    GetPid = 2,
    Fork = 3,
    CowFork = 4,
    VFork = 5,
    GetPpid = 6,
    Sleep = 7,
    Signal = 8,
    Clone = 9,
    Stats = 10,
    MemInfo = 11,
    PageMap = 12,
    UserPages = 13,
    CowFaults = 14,

    // File descriptors (15-21)
    Open = 15,
    Close = 16,
    Read = 17,
    Write = 18,
    Lseek = 19,
    Dup = 20,
    Dup2 = 21,

    // Memory management (22-24)
    Mmap = 22,
    Munmap = 23,
    Mprotect = 24,

    // Tracing (25-31)
    CreateTraceBuffer = 25,
    Strace = 26,
    StartStrace = 27,
    EndStrace = 28,
    ReadStrace = 29,
    Ftrace = 30,
    ReadFtrace = 31,
}

/// System call error codes - must match the kernel's SyscallError enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum SyscallError {
    /// Invalid argument.
    InvalidArgument = -1,
    /// Out of memory.
    OutOfMemory = -2,
    /// Bad user-memory range.
    BadUserMemory = -3,
    /// Operation not valid in the current state.
    InvalidState = -4,
    /// Unknown error.
    Unknown = -255,
}

impl SyscallError {
    /// Convert a raw return value to an error.
    pub fn from_raw(val: i64) -> Self {
        match val {
            -1 => Self::InvalidArgument,
            -2 => Self::OutOfMemory,
            -3 => Self::BadUserMemory,
            -4 => Self::InvalidState,
            _ => Self::Unknown,
        }
    }
}

/// Result type for system calls.
pub type SyscallResult = Result<u64, SyscallError>;

/// Convert a raw syscall return value to a Result.
#[inline]
fn convert_result(ret: i64) -> SyscallResult {
    if ret >= 0 {
        Ok(ret as u64)
    } else {
        Err(SyscallError::from_raw(ret))
    }
}

/// System call with no arguments.
#[inline]
pub unsafe fn syscall0(nr: SyscallNumber) -> SyscallResult {
    let ret: i64;
    asm!(
        "syscall",
        inout("rax") nr as u64 => ret,
        out("rcx") _,  // clobbered by syscall
        out("r11") _,  // clobbered by syscall
        options(nostack, preserves_flags)
    );
    convert_result(ret)
}

/// System call with 1 argument.
#[inline]
pub unsafe fn syscall1(nr: SyscallNumber, arg1: u64) -> SyscallResult {
    let ret: i64;
    asm!(
        "syscall",
        inout("rax") nr as u64 => ret,
        in("rdi") arg1,
        out("rcx") _,
        out("r11") _,
        options(nostack, preserves_flags)
    );
    convert_result(ret)
}

/// System call with 2 arguments.
#[inline]
pub unsafe fn syscall2(nr: SyscallNumber, arg1: u64, arg2: u64) -> SyscallResult {
    let ret: i64;
    asm!(
        "syscall",
        inout("rax") nr as u64 => ret,
        in("rdi") arg1,
        in("rsi") arg2,
        out("rcx") _,
        out("r11") _,
        options(nostack, preserves_flags)
    );
    convert_result(ret)
}

/// System call with 3 arguments.
#[inline]
pub unsafe fn syscall3(nr: SyscallNumber, arg1: u64, arg2: u64, arg3: u64) -> SyscallResult {
    let ret: i64;
    asm!(
        "syscall",
        inout("rax") nr as u64 => ret,
        in("rdi") arg1,
        in("rsi") arg2,
        in("rdx") arg3,
        out("rcx") _,
        out("r11") _,
        options(nostack, preserves_flags)
    );
    convert_result(ret)
}

/// System call with 4 arguments.
#[inline]
pub unsafe fn syscall4(
    nr: SyscallNumber,
    arg1: u64,
    arg2: u64,
    arg3: u64,
    arg4: u64,
) -> SyscallResult {
    let ret: i64;
    asm!(
        "syscall",
        inout("rax") nr as u64 => ret,
        in("rdi") arg1,
        in("rsi") arg2,
        in("rdx") arg3,
        in("r10") arg4,
        out("rcx") _,
        out("r11") _,
        options(nostack, preserves_flags)
    );
    convert_result(ret)
}
