//! Pyrite userspace library.
//!
//! Userspace programs talk to the kernel through the `syscall` instruction.
//! This library provides safe wrappers around the raw calls plus decoding
//! for the tracing subsystem's event streams.
//!
//! # Example
//!
//! ```rust,no_run
//! use userlib::trace;
//!
//! let fd = trace::create_trace_buffer(trace::TRACE_RDWR).unwrap();
//! trace::start_strace(fd as i32, trace::TRACE_FULL).unwrap();
//! ```

#![cfg_attr(not(test), no_std)]
#![allow(unsafe_op_in_unsafe_fn)]

pub mod io;
pub mod process;
pub mod syscall;
pub mod trace;

/// Re-export commonly used items.
pub mod prelude {
    pub use crate::io::{print, println};
    pub use crate::process::{exit, getpid};
    pub use crate::syscall::SyscallError;
}
