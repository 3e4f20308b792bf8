//! System call interface.
//!
//! Numbers, argument profiles and error codes shared by the dispatch layer,
//! the tracer and userspace. The numeric values are ABI: userlib mirrors
//! them and compiled programs bake them in.

pub mod dispatch;

use core::convert::TryFrom;

/// System call numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum SyscallNumber {
    // ========== Process management ==========
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

    // ========== File descriptors ==========
    Open = 15,
    Close = 16,
    Read = 17,
    Write = 18,
    Lseek = 19,
    Dup = 20,
    Dup2 = 21,

    // ========== Memory management ==========
    Mmap = 22,
    Munmap = 23,
    Mprotect = 24,

    // ========== Tracing ==========
    CreateTraceBuffer = 25,
    Strace = 26,
    StartStrace = 27,
    EndStrace = 28,
    ReadStrace = 29,
    Ftrace = 30,
    ReadFtrace = 31,
}

impl TryFrom<u64> for SyscallNumber {
    type Error = ();

    fn try_from(raw: u64) -> Result<Self, ()> {
        match raw {
            1 => Ok(Self::Exit),
            2 => Ok(Self::GetPid),
            3 => Ok(Self::Fork),
            4 => Ok(Self::CowFork),
            5 => Ok(Self::VFork),
            6 => Ok(Self::GetPpid),
            7 => Ok(Self::Sleep),
            8 => Ok(Self::Signal),
            9 => Ok(Self::Clone),
            10 => Ok(Self::Stats),
            11 => Ok(Self::MemInfo),
            12 => Ok(Self::PageMap),
            13 => Ok(Self::UserPages),
            14 => Ok(Self::CowFaults),
            15 => Ok(Self::Open),
            16 => Ok(Self::Close),
            17 => Ok(Self::Read),
            18 => Ok(Self::Write),
            19 => Ok(Self::Lseek),
            20 => Ok(Self::Dup),
            21 => Ok(Self::Dup2),
            22 => Ok(Self::Mmap),
            23 => Ok(Self::Munmap),
            24 => Ok(Self::Mprotect),
            25 => Ok(Self::CreateTraceBuffer),
            26 => Ok(Self::Strace),
            27 => Ok(Self::StartStrace),
            28 => Ok(Self::EndStrace),
            29 => Ok(Self::ReadStrace),
            30 => Ok(Self::Ftrace),
            31 => Ok(Self::ReadFtrace),
            _ => Err(()),
        }
    }
}

/// Number of argument words a recorded event carries for each syscall.
///
/// Single source of truth for the event encoder and both stream decoders.
/// An encoded event is `8 * (1 + arg_count(id))` bytes.
pub fn arg_count(nr: SyscallNumber) -> usize {
    use SyscallNumber::*;
    match nr {
        Exit | GetPid | Fork | CowFork | VFork | GetPpid | Stats | MemInfo | UserPages
        | CowFaults | EndStrace => 0,
        Sleep | PageMap | Dup | Close | CreateTraceBuffer => 1,
        Signal | Clone | Open | Dup2 | Munmap | Strace | StartStrace => 2,
        Read | Write | Lseek | Mprotect | ReadStrace | ReadFtrace => 3,
        Mmap | Ftrace => 4,
    }
}

/// Human-readable name for a raw syscall number, for log lines.
pub fn syscall_name(raw: u64) -> Option<&'static str> {
    let name = match raw {
        1 => "exit",
        2 => "getpid",
        3 => "fork",
        4 => "cfork",
        5 => "vfork",
        6 => "getppid",
        7 => "sleep",
        8 => "signal",
        9 => "clone",
        10 => "stats",
        11 => "meminfo",
        12 => "pagemap",
        13 => "user_pages",
        14 => "cow_faults",
        15 => "open",
        16 => "close",
        17 => "read",
        18 => "write",
        19 => "lseek",
        20 => "dup",
        21 => "dup2",
        22 => "mmap",
        23 => "munmap",
        24 => "mprotect",
        25 => "create_trace_buffer",
        26 => "strace",
        27 => "start_strace",
        28 => "end_strace",
        29 => "read_strace",
        30 => "ftrace",
        31 => "read_ftrace",
        _ => return None,
    };
    Some(name)
}

/// System call error codes.
///
/// Folded to their negative discriminant at the dispatch boundary, so the
/// numeric values are ABI too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum SyscallError {
    /// Malformed argument: unknown number or action, bad descriptor,
    /// duplicate or missing registration.
    InvalidArgument = -1,
    /// A backing allocation failed.
    OutOfMemory = -2,
    /// A user-supplied range failed validation.
    BadUserMemory = -3,
    /// The operation needs state that is absent or incompatible: a mode the
    /// buffer was not created with, an unarmed tracer, a full event sink.
    InvalidState = -4,
}

/// Result type for every system call handler.
pub type SyscallResult = Result<u64, SyscallError>;

/// Register-file view of one system call: the number and the four argument
/// slots the entry stub captured.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct SyscallContext {
    pub num: u64,
    pub arg1: u64,
    pub arg2: u64,
    pub arg3: u64,
    pub arg4: u64,
}

impl SyscallContext {
    pub fn new(num: u64, arg1: u64, arg2: u64, arg3: u64, arg4: u64) -> Self {
        SyscallContext { num, arg1, arg2, arg3, arg4 }
    }

    /// The argument slots in order.
    pub fn args(&self) -> [u64; 4] {
        [self.arg1, self.arg2, self.arg3, self.arg4]
    }
}
