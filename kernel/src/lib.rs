//! Pyrite kernel library.
//!
//! The crate is built freestanding for the kernel proper and as a normal
//! hosted library for unit tests, which is why almost everything in here is
//! written against `core` and `alloc` only.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod allocator;
pub mod config;
pub mod logger;
pub mod process;
pub mod serial;
pub mod syscall;
pub mod tracer;
pub mod vfs;
