//! Kernel heap allocator.
//!
//! A linked-list heap over a fixed virtual region. The region must be mapped
//! by the paging setup before [`init_heap`] runs. Hosted builds (unit tests
//! and test-binary dependencies) use the platform allocator instead.

use linked_list_allocator::LockedHeap;

/// Start of the kernel heap mapping.
pub const HEAP_START: usize = 0x4444_4444_0000;

/// Kernel heap size (16 MiB).
pub const HEAP_SIZE: usize = 16 * 1024 * 1024;

#[cfg(all(not(test), target_os = "none"))]
#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

/// Hand the heap region to the allocator.
///
/// # Safety
///
/// `[start, start + size)` must be mapped, writable and unused, and this
/// must be called exactly once.
#[cfg(all(not(test), target_os = "none"))]
pub unsafe fn init_heap(start: *mut u8, size: usize) {
    unsafe { ALLOCATOR.lock().init(start, size) };
    log::info!("heap: {} KiB at {:#x}", size / 1024, start as usize);
}
