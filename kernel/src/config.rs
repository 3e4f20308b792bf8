//! Kernel configuration constants.

/// Page size in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Capacity of a trace buffer ring (one page).
pub const TRACE_BUFFER_SIZE: usize = PAGE_SIZE;

/// Highest number of open descriptors per process.
pub const MAX_OPEN_FILES: i32 = 16;

/// Most functions that may be registered for function tracing at once.
pub const FTRACE_MAX_ENTRIES: usize = 16;

/// Most argument registers a traced function call records.
pub const FTRACE_MAX_ARGS: usize = 6;

/// Number of entry bytes replaced when a traced function is enabled.
pub const PATCH_SIZE: usize = 4;

/// Opcode bytes installed over a traced function's entry.
///
/// 0xFF with a /7 extension is an undefined opcode, so executing the patched
/// entry raises an invalid-opcode fault that the tracer owns.
pub const TRAP_OPCODE: [u8; PATCH_SIZE] = [0xFF; PATCH_SIZE];

/// Sentinel stored below the first stack frame of a user thread.
///
/// The backtrace walk stops when a return address equals this value. It is a
/// non-canonical address, so it can never collide with real user code.
pub const STACK_END: u64 = 0xDEAD_BEEF_DEAD_BEEF;
