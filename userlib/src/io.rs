//! I/O functions for userspace.

use crate::syscall::{syscall1, syscall3, SyscallNumber, SyscallResult};

/// File descriptor for stdin.
pub const STDIN: u64 = 0;
/// File descriptor for stdout.
pub const STDOUT: u64 = 1;
/// File descriptor for stderr.
pub const STDERR: u64 = 2;

/// Write bytes to a file descriptor.
pub fn write(fd: u64, buf: &[u8]) -> SyscallResult {
    unsafe {
        syscall3(
            SyscallNumber::Write,
            fd,
            buf.as_ptr() as u64,
            buf.len() as u64,
        )
    }
}

/// Read bytes from a file descriptor.
pub fn read(fd: u64, buf: &mut [u8]) -> SyscallResult {
    unsafe {
        syscall3(
            SyscallNumber::Read,
            fd,
            buf.as_mut_ptr() as u64,
            buf.len() as u64,
        )
    }
}

/// Close a file descriptor.
pub fn close(fd: u64) -> SyscallResult {
    unsafe { syscall1(SyscallNumber::Close, fd) }
}

/// Print a string to stdout.
pub fn print(s: &str) {
    let _ = write(STDOUT, s.as_bytes());
}

/// Print a string to stdout with a newline.
pub fn println(s: &str) {
    print(s);
    print("\n");
}

/// Print a string to stderr.
pub fn eprint(s: &str) {
    let _ = write(STDERR, s.as_bytes());
}

/// Print a string to stderr with a newline.
pub fn eprintln(s: &str) {
    eprint(s);
    eprint("\n");
}
