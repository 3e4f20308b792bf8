//! File objects and the per-process descriptor table.
//!
//! Only the file kinds the tracing subsystem needs live here: the three
//! standard streams and trace-buffer files. A trace buffer is owned by its
//! descriptor, so closing the descriptor frees the ring.

pub mod fd;

use crate::tracer::TraceBuffer;

pub use fd::FdTable;

/// The standard streams preinstalled at descriptors 0 through 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdioKind {
    Stdin,
    Stdout,
    Stderr,
}

/// What an open descriptor refers to.
pub enum FileKind {
    /// Console-backed standard stream.
    Stdio(StdioKind),
    /// A trace buffer owned by this descriptor.
    Trace(TraceBuffer),
}

/// An open file.
pub struct File {
    pub kind: FileKind,
}

impl File {
    pub fn stdio(kind: StdioKind) -> Self {
        File { kind: FileKind::Stdio(kind) }
    }

    pub fn trace(buffer: TraceBuffer) -> Self {
        File { kind: FileKind::Trace(buffer) }
    }

    pub fn is_trace(&self) -> bool {
        matches!(self.kind, FileKind::Trace(_))
    }

    pub fn trace_buffer(&self) -> Option<&TraceBuffer> {
        match &self.kind {
            FileKind::Trace(buffer) => Some(buffer),
            _ => None,
        }
    }

    pub fn trace_buffer_mut(&mut self) -> Option<&mut TraceBuffer> {
        match &mut self.kind {
            FileKind::Trace(buffer) => Some(buffer),
            _ => None,
        }
    }
}
