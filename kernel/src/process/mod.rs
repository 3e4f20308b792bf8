//! Process state: memory layout, user-memory access and execution context.

pub mod context;
pub mod mm;
pub mod usermem;

pub use context::{ExecContext, ProcessId};
pub use mm::{Access, AddressSpace, Segment, SegmentKind, VmArea};
pub use usermem::{DirectMemory, SliceMemory, UserMemory};
