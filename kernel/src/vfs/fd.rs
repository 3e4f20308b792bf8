//! Per-process file descriptor table and the descriptor-level syscalls.

use alloc::collections::BTreeMap;

use crate::config::MAX_OPEN_FILES;
use crate::process::mm::Access;
use crate::process::usermem::UserMemory;
use crate::process::ExecContext;
use crate::serial;
use crate::syscall::{SyscallError, SyscallResult};

use super::{File, FileKind, StdioKind};

/// Open files of one process, keyed by descriptor.
pub struct FdTable {
    entries: BTreeMap<i32, File>,
}

impl FdTable {
    /// Fresh table with the standard streams installed at 0 through 2.
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(0, File::stdio(StdioKind::Stdin));
        entries.insert(1, File::stdio(StdioKind::Stdout));
        entries.insert(2, File::stdio(StdioKind::Stderr));
        FdTable { entries }
    }

    /// Install `file` at the lowest free descriptor.
    pub fn install(&mut self, file: File) -> Result<i32, SyscallError> {
        let fd = (0..MAX_OPEN_FILES)
            .find(|fd| !self.entries.contains_key(fd))
            .ok_or(SyscallError::InvalidArgument)?;
        self.entries.insert(fd, file);
        Ok(fd)
    }

    pub fn get(&self, fd: i32) -> Option<&File> {
        self.entries.get(&fd)
    }

    pub fn get_mut(&mut self, fd: i32) -> Option<&mut File> {
        self.entries.get_mut(&fd)
    }

    /// Remove and return the file at `fd`, dropping nothing yet.
    pub fn remove(&mut self, fd: i32) -> Option<File> {
        self.entries.remove(&fd)
    }

    pub fn open_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= MAX_OPEN_FILES as usize
    }
}

/// Narrow a raw descriptor argument.
pub fn fd_from_raw(raw: u64) -> Result<i32, SyscallError> {
    i32::try_from(raw).map_err(|_| SyscallError::InvalidArgument)
}

// ── Descriptor-level syscalls ──

/// Read from a descriptor into user memory at `addr`.
pub fn read(ctx: &mut ExecContext, fd: u64, addr: u64, count: u64) -> SyscallResult {
    let fd = fd_from_raw(fd)?;
    let count = count as usize;
    let ExecContext { mm, mem, files, .. } = ctx;
    let file = files.get_mut(fd).ok_or(SyscallError::InvalidArgument)?;
    match &mut file.kind {
        FileKind::Stdio(StdioKind::Stdin) => Ok(0),
        FileKind::Stdio(_) => Err(SyscallError::InvalidArgument),
        FileKind::Trace(buffer) => {
            if !buffer.readable() {
                return Err(SyscallError::InvalidState);
            }
            if !mm.valid_range(addr, count, Access::WRITE) {
                return Err(SyscallError::BadUserMemory);
            }
            let mut scratch = [0u8; 256];
            let mut done = 0usize;
            while done < count {
                let want = (count - done).min(scratch.len());
                let got = buffer.pop(&mut scratch[..want]);
                if got == 0 {
                    break;
                }
                mem.write_bytes(addr + done as u64, &scratch[..got]);
                done += got;
            }
            Ok(done as u64)
        }
    }
}

/// Write `count` bytes of user memory at `addr` to a descriptor.
pub fn write(ctx: &mut ExecContext, fd: u64, addr: u64, count: u64) -> SyscallResult {
    let fd = fd_from_raw(fd)?;
    let count = count as usize;
    let ExecContext { mm, mem, files, .. } = ctx;
    let file = files.get_mut(fd).ok_or(SyscallError::InvalidArgument)?;
    match &mut file.kind {
        FileKind::Stdio(StdioKind::Stdout) | FileKind::Stdio(StdioKind::Stderr) => {
            if !mm.valid_range(addr, count, Access::READ) {
                return Err(SyscallError::BadUserMemory);
            }
            let mut scratch = [0u8; 256];
            let mut done = 0usize;
            while done < count {
                let take = (count - done).min(scratch.len());
                mem.read_bytes(addr + done as u64, &mut scratch[..take]);
                for &byte in &scratch[..take] {
                    serial::write_byte(byte);
                }
                done += take;
            }
            Ok(count as u64)
        }
        FileKind::Stdio(StdioKind::Stdin) => Err(SyscallError::InvalidArgument),
        FileKind::Trace(buffer) => {
            if !buffer.writable() {
                return Err(SyscallError::InvalidState);
            }
            if !mm.valid_range(addr, count, Access::READ) {
                return Err(SyscallError::BadUserMemory);
            }
            let mut scratch = [0u8; 256];
            let mut done = 0usize;
            while done < count {
                let take = (count - done).min(scratch.len());
                mem.read_bytes(addr + done as u64, &mut scratch[..take]);
                let accepted = buffer.push(&scratch[..take]);
                done += accepted;
                if accepted < take {
                    break;
                }
            }
            Ok(done as u64)
        }
    }
}

/// Close a descriptor. Dropping a trace file frees its ring.
pub fn close(ctx: &mut ExecContext, fd: u64) -> SyscallResult {
    let fd = fd_from_raw(fd)?;
    match ctx.files.remove(fd) {
        Some(_) => Ok(0),
        None => Err(SyscallError::InvalidArgument),
    }
}

/// Reposition a descriptor. Neither streams nor trace buffers are seekable.
pub fn lseek(ctx: &mut ExecContext, fd: u64, _offset: u64, _whence: u64) -> SyscallResult {
    let fd = fd_from_raw(fd)?;
    if ctx.files.get(fd).is_none() {
        return Err(SyscallError::InvalidArgument);
    }
    Err(SyscallError::InvalidArgument)
}
