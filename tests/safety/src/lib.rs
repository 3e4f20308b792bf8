//! Pyrite Tracing Invariant Verification
//!
//! Checks for the properties the tracing subsystem guarantees: ring
//! accounting, byte-order across wraparound, filtered recording, patch
//! round-trips, registry bounds and backtrace depth. Each check drives the
//! real kernel code over an in-memory user address space.

#![cfg_attr(not(test), no_std)]
extern crate alloc;

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use hashbrown::HashMap;
use spin::Mutex;

use pyrite_kernel::config::{FTRACE_MAX_ENTRIES, PATCH_SIZE, TRAP_OPCODE};
use pyrite_kernel::process::mm::{Access, Segment};
use pyrite_kernel::process::{ExecContext, SegmentKind, SliceMemory, UserMemory};
use pyrite_kernel::syscall::dispatch::dispatch;
use pyrite_kernel::syscall::{SyscallContext, SyscallError, SyscallNumber};
use pyrite_kernel::tracer::buffer::create_trace_buffer;
use pyrite_kernel::tracer::ftrace::ftrace;
use pyrite_kernel::tracer::strace::{on_syscall_entry, start_strace, strace};
use pyrite_kernel::tracer::trap::{handle_trap, TrapFrame};
use pyrite_kernel::tracer::TraceBuffer;

/// Safety check result
#[derive(Debug, Clone)]
pub enum SafetyResult {
    /// Check passed
    Pass,
    /// Check failed with error
    Fail(String),
}

impl SafetyResult {
    pub fn passed(&self) -> bool {
        matches!(self, SafetyResult::Pass)
    }
}

/// Safety check trait
pub trait SafetyCheck {
    fn name(&self) -> &str;
    fn run(&mut self) -> SafetyResult;
}

const FUNC: u64 = 0x1200;
const SCRATCH: u64 = 0x4800;
const STACK_TOP: u64 = 0x7F00;

/// A context whose image covers code, data and stack segments.
fn build_context() -> ExecContext {
    let mut ctx = ExecContext::new(Box::new(SliceMemory::new(0x1000, 0x7000)));
    ctx.mm.segments[SegmentKind::Code as usize] =
        Segment { start: 0x1000, end: 0x3000, next_free: 0x2000 };
    ctx.mm.segments[SegmentKind::Data as usize] =
        Segment { start: 0x4000, end: 0x6000, next_free: 0x6000 };
    ctx.mm.segments[SegmentKind::Stack as usize] =
        Segment { start: 0x7000, end: 0x8000, next_free: 0x7000 };
    ctx.mem.write_bytes(FUNC, &[0x55, 0x48, 0x89, 0xE5]);
    ctx
}

fn xorshift(state: &mut u64) -> u64 {
    *state ^= *state << 13;
    *state ^= *state >> 7;
    *state ^= *state << 17;
    *state
}

/// Ring accounting against a queue model under random traffic
pub struct RingAccountingCheck;

impl SafetyCheck for RingAccountingCheck {
    fn name(&self) -> &str {
        "ring_accounting"
    }

    fn run(&mut self) -> SafetyResult {
        let mut ring = match TraceBuffer::with_capacity(Access::READ | Access::WRITE, 64) {
            Ok(ring) => ring,
            Err(err) => return SafetyResult::Fail(format!("allocation failed: {:?}", err)),
        };
        let mut model: VecDeque<u8> = VecDeque::new();
        let mut seed = 0x9E37_79B9_7F4A_7C15u64;
        let mut next_byte = 0u8;

        for step in 0..2000 {
            let roll = xorshift(&mut seed);
            let len = (roll % 24) as usize;
            if roll & 1 == 0 {
                let mut chunk = vec![0u8; len];
                for byte in chunk.iter_mut() {
                    *byte = next_byte;
                    next_byte = next_byte.wrapping_add(1);
                }
                let free_before = ring.free();
                let taken = ring.push(&chunk);
                if taken != len.min(free_before) {
                    return SafetyResult::Fail(format!("step {}: short write {}", step, taken));
                }
                for &byte in &chunk[..taken] {
                    model.push_back(byte);
                }
            } else {
                let mut out = vec![0u8; len];
                let got = ring.pop(&mut out);
                if got != len.min(model.len()) {
                    return SafetyResult::Fail(format!("step {}: short read {}", step, got));
                }
                for &byte in &out[..got] {
                    match model.pop_front() {
                        Some(expected) if expected == byte => {}
                        other => {
                            return SafetyResult::Fail(format!(
                                "step {}: got {} expected {:?}",
                                step, byte, other
                            ))
                        }
                    }
                }
            }
            if ring.occupied() != model.len() || ring.free() + ring.occupied() != 64 {
                return SafetyResult::Fail(format!("step {}: accounting drifted", step));
            }
        }
        SafetyResult::Pass
    }
}

/// Byte order across a wrapped write
pub struct WrapReassemblyCheck;

impl SafetyCheck for WrapReassemblyCheck {
    fn name(&self) -> &str {
        "wrap_reassembly"
    }

    fn run(&mut self) -> SafetyResult {
        let mut ring = match TraceBuffer::with_capacity(Access::READ | Access::WRITE, 16) {
            Ok(ring) => ring,
            Err(err) => return SafetyResult::Fail(format!("allocation failed: {:?}", err)),
        };
        let first: Vec<u8> = (0u8..12).collect();
        ring.push(&first);
        let mut out = [0u8; 10];
        ring.pop(&mut out);
        let second: Vec<u8> = (100u8..108).collect();
        if ring.push(&second) != 8 {
            return SafetyResult::Fail(String::from("wrapped write rejected"));
        }
        let mut rest = [0u8; 10];
        if ring.pop(&mut rest) != 10 {
            return SafetyResult::Fail(String::from("wrapped read came up short"));
        }
        let expected = [10u8, 11, 100, 101, 102, 103, 104, 105, 106, 107];
        if rest != expected {
            return SafetyResult::Fail(format!("bytes reordered: {:?}", rest));
        }
        SafetyResult::Pass
    }
}

/// Filtered tracing records watched calls only
pub struct FilteredTracingCheck;

impl SafetyCheck for FilteredTracingCheck {
    fn name(&self) -> &str {
        "filtered_tracing"
    }

    fn run(&mut self) -> SafetyResult {
        let mut ctx = build_context();
        let fd = match create_trace_buffer(&mut ctx, 3) {
            Ok(fd) => fd,
            Err(err) => return SafetyResult::Fail(format!("create failed: {:?}", err)),
        };
        if let Err(err) = start_strace(&mut ctx, fd, 2) {
            return SafetyResult::Fail(format!("arming failed: {:?}", err));
        }
        if let Err(err) = strace(&mut ctx, SyscallNumber::Open as u64, 1) {
            return SafetyResult::Fail(format!("watch failed: {:?}", err));
        }

        let occupied = |ctx: &ExecContext| {
            ctx.files
                .get(fd as i32)
                .and_then(|file| file.trace_buffer())
                .map(|buffer| buffer.occupied())
        };

        on_syscall_entry(&mut ctx, SyscallNumber::GetPid as u64, [0; 4]);
        if occupied(&ctx) != Some(0) {
            return SafetyResult::Fail(String::from("unwatched call was recorded"));
        }
        on_syscall_entry(&mut ctx, SyscallNumber::Open as u64, [SCRATCH, 0, 0, 0]);
        if occupied(&ctx) != Some(24) {
            return SafetyResult::Fail(format!(
                "watched 2-argument call should be 24 bytes, sink has {:?}",
                occupied(&ctx)
            ));
        }
        SafetyResult::Pass
    }
}

/// Patching then unpatching restores the original bytes
pub struct PatchRestoreCheck;

impl SafetyCheck for PatchRestoreCheck {
    fn name(&self) -> &str {
        "patch_restore"
    }

    fn run(&mut self) -> SafetyResult {
        let mut ctx = build_context();
        let fd = match create_trace_buffer(&mut ctx, 3) {
            Ok(fd) => fd,
            Err(err) => return SafetyResult::Fail(format!("create failed: {:?}", err)),
        };
        let mut original = [0u8; PATCH_SIZE];
        ctx.mem.read_bytes(FUNC, &mut original);

        if let Err(err) = ftrace(&mut ctx, FUNC, 1, 2, fd) {
            return SafetyResult::Fail(format!("register failed: {:?}", err));
        }
        if let Err(err) = ftrace(&mut ctx, FUNC, 3, 0, 0) {
            return SafetyResult::Fail(format!("enable failed: {:?}", err));
        }
        let mut patched = [0u8; PATCH_SIZE];
        ctx.mem.read_bytes(FUNC, &mut patched);
        if patched != TRAP_OPCODE {
            return SafetyResult::Fail(format!("entry not patched: {:?}", patched));
        }
        if let Err(err) = ftrace(&mut ctx, FUNC, 4, 0, 0) {
            return SafetyResult::Fail(format!("disable failed: {:?}", err));
        }
        let mut restored = [0u8; PATCH_SIZE];
        ctx.mem.read_bytes(FUNC, &mut restored);
        if restored != original {
            return SafetyResult::Fail(format!("bytes not restored: {:?}", restored));
        }
        SafetyResult::Pass
    }
}

/// Enabling twice must not clobber the saved bytes
pub struct EnableIdempotenceCheck;

impl SafetyCheck for EnableIdempotenceCheck {
    fn name(&self) -> &str {
        "enable_idempotence"
    }

    fn run(&mut self) -> SafetyResult {
        let mut ctx = build_context();
        let fd = match create_trace_buffer(&mut ctx, 3) {
            Ok(fd) => fd,
            Err(err) => return SafetyResult::Fail(format!("create failed: {:?}", err)),
        };
        let mut original = [0u8; PATCH_SIZE];
        ctx.mem.read_bytes(FUNC, &mut original);

        for action in [1u64, 3, 3, 5, 4] {
            let (nargs, arg_fd) = if action == 1 { (2, fd) } else { (0, 0) };
            if let Err(err) = ftrace(&mut ctx, FUNC, action, nargs, arg_fd) {
                return SafetyResult::Fail(format!("action {} failed: {:?}", action, err));
            }
        }
        let mut restored = [0u8; PATCH_SIZE];
        ctx.mem.read_bytes(FUNC, &mut restored);
        if restored != original {
            return SafetyResult::Fail(String::from("repeated enables corrupted the backup"));
        }
        SafetyResult::Pass
    }
}

/// Registry rejects past capacity and stays intact
pub struct RegistryCapacityCheck;

impl SafetyCheck for RegistryCapacityCheck {
    fn name(&self) -> &str {
        "registry_capacity"
    }

    fn run(&mut self) -> SafetyResult {
        let mut ctx = build_context();
        let fd = match create_trace_buffer(&mut ctx, 3) {
            Ok(fd) => fd,
            Err(err) => return SafetyResult::Fail(format!("create failed: {:?}", err)),
        };
        for i in 0..FTRACE_MAX_ENTRIES as u64 {
            if let Err(err) = ftrace(&mut ctx, FUNC + i * 16, 1, 0, fd) {
                return SafetyResult::Fail(format!("registration {} failed: {:?}", i, err));
            }
        }
        let over = FUNC + FTRACE_MAX_ENTRIES as u64 * 16;
        match ftrace(&mut ctx, over, 1, 0, fd) {
            Err(SyscallError::InvalidArgument) => {}
            other => return SafetyResult::Fail(format!("over-capacity gave {:?}", other)),
        }
        let state = match ctx.ftrace.as_ref() {
            Some(state) => state,
            None => return SafetyResult::Fail(String::from("registry vanished")),
        };
        if state.len() != FTRACE_MAX_ENTRIES || state.get(over).is_some() {
            return SafetyResult::Fail(String::from("failed registration left residue"));
        }
        SafetyResult::Pass
    }
}

/// A backtrace over N frames records N + 1 words before the delimiter
pub struct BacktraceDepthCheck;

impl SafetyCheck for BacktraceDepthCheck {
    fn name(&self) -> &str {
        "backtrace_depth"
    }

    fn run(&mut self) -> SafetyResult {
        let mut ctx = build_context();
        let fd = match create_trace_buffer(&mut ctx, 3) {
            Ok(fd) => fd,
            Err(err) => return SafetyResult::Fail(format!("create failed: {:?}", err)),
        };
        if let Err(err) = ftrace(&mut ctx, FUNC, 1, 0, fd) {
            return SafetyResult::Fail(format!("register failed: {:?}", err));
        }
        if let Err(err) = ftrace(&mut ctx, FUNC, 5, 0, 0) {
            return SafetyResult::Fail(format!("backtrace enable failed: {:?}", err));
        }

        // Three call frames, then the sentinel below the oldest one.
        let frames = [0x7E00u64, 0x7D00, 0x7C00];
        ctx.mem.write_u64(STACK_TOP, 0x1A30);
        ctx.mem.write_u64(frames[2] + 8, 0x1A20);
        ctx.mem.write_u64(frames[2], frames[1]);
        ctx.mem.write_u64(frames[1] + 8, 0x1A10);
        ctx.mem.write_u64(frames[1], frames[0]);
        ctx.mem.write_u64(frames[0] + 8, pyrite_kernel::config::STACK_END);

        let frame = TrapFrame {
            rip: FUNC,
            rsp: STACK_TOP,
            rbp: frames[2],
            ..TrapFrame::default()
        };
        if let Err(err) = handle_trap(&mut ctx, &frame) {
            return SafetyResult::Fail(format!("trap failed: {:?}", err));
        }

        let buffer = match ctx.files.get_mut(fd as i32).and_then(|f| f.trace_buffer_mut()) {
            Some(buffer) => buffer,
            None => return SafetyResult::Fail(String::from("sink vanished")),
        };
        // Event: address word, then rip + 3 return addresses, then delimiter.
        let mut words = Vec::new();
        while let Some(word) = buffer.pop_word() {
            words.push(word);
        }
        let expected = [
            FUNC,
            FUNC,
            0x1A30,
            0x1A20,
            0x1A10,
            pyrite_kernel::config::STACK_END,
        ];
        if words != expected {
            return SafetyResult::Fail(format!("unexpected event words: {:x?}", words));
        }
        SafetyResult::Pass
    }
}

/// A spin-mutexed sink accepts events from a shared reference
pub struct MutexedSinkCheck;

impl SafetyCheck for MutexedSinkCheck {
    fn name(&self) -> &str {
        "mutexed_sink"
    }

    fn run(&mut self) -> SafetyResult {
        let ring = match TraceBuffer::with_capacity(Access::READ | Access::WRITE, 256) {
            Ok(ring) => Mutex::new(ring),
            Err(err) => return SafetyResult::Fail(format!("allocation failed: {:?}", err)),
        };
        for i in 0..16u64 {
            let mut guard = ring.lock();
            if guard.push_word(i).is_err() {
                return SafetyResult::Fail(format!("word {} rejected", i));
            }
        }
        let mut guard = ring.lock();
        for i in 0..16u64 {
            if guard.pop_word() != Some(i) {
                return SafetyResult::Fail(format!("word {} corrupted", i));
            }
        }
        SafetyResult::Pass
    }
}

/// Patch state tracked in a shadow map matches memory after random toggles
pub struct ShadowPatchCheck;

impl SafetyCheck for ShadowPatchCheck {
    fn name(&self) -> &str {
        "shadow_patch"
    }

    fn run(&mut self) -> SafetyResult {
        let mut ctx = build_context();
        let fd = match create_trace_buffer(&mut ctx, 3) {
            Ok(fd) => fd,
            Err(err) => return SafetyResult::Fail(format!("create failed: {:?}", err)),
        };

        let addrs: Vec<u64> = (0..8).map(|i| FUNC + i * 32).collect();
        let mut originals: HashMap<u64, [u8; PATCH_SIZE]> = HashMap::new();
        for (i, &addr) in addrs.iter().enumerate() {
            let stamp = [i as u8, 0x48, 0x89, 0xE5];
            ctx.mem.write_bytes(addr, &stamp);
            originals.insert(addr, stamp);
            if let Err(err) = ftrace(&mut ctx, addr, 1, 0, fd) {
                return SafetyResult::Fail(format!("register {:#x} failed: {:?}", addr, err));
            }
        }

        let mut shadow: HashMap<u64, bool> = addrs.iter().map(|&a| (a, false)).collect();
        let mut seed = 0xC0FF_EE00_DEAD_1234u64;
        for _ in 0..200 {
            let roll = xorshift(&mut seed);
            let addr = addrs[(roll % addrs.len() as u64) as usize];
            let enable = roll & 8 == 0;
            let action = if enable { 3 } else { 4 };
            if let Err(err) = ftrace(&mut ctx, addr, action, 0, 0) {
                return SafetyResult::Fail(format!("toggle {:#x} failed: {:?}", addr, err));
            }
            shadow.insert(addr, enable);
        }

        for &addr in &addrs {
            let mut bytes = [0u8; PATCH_SIZE];
            ctx.mem.read_bytes(addr, &mut bytes);
            let expected = if shadow[&addr] { TRAP_OPCODE } else { originals[&addr] };
            if bytes != expected {
                return SafetyResult::Fail(format!("{:#x} diverged from shadow", addr));
            }
        }
        SafetyResult::Pass
    }
}

/// Events recorded through dispatch decode with the userspace parser
pub struct AbiRoundTripCheck;

impl SafetyCheck for AbiRoundTripCheck {
    fn name(&self) -> &str {
        "abi_round_trip"
    }

    fn run(&mut self) -> SafetyResult {
        let mut ctx = build_context();
        let call = |ctx: &mut ExecContext, num: u64, args: [u64; 4]| {
            dispatch(ctx, &SyscallContext::new(num, args[0], args[1], args[2], args[3]))
        };

        let fd = match call(&mut ctx, 25, [3, 0, 0, 0]) {
            Some(fd) if fd >= 0 => fd as u64,
            other => return SafetyResult::Fail(format!("create gave {:?}", other)),
        };
        if call(&mut ctx, 27, [fd, 1, 0, 0]) != Some(0) {
            return SafetyResult::Fail(String::from("arming failed"));
        }
        call(&mut ctx, 2, [0; 4]);
        call(&mut ctx, 7, [500, 0, 0, 0]);
        if call(&mut ctx, 28, [0; 4]) != Some(0) {
            return SafetyResult::Fail(String::from("disarming failed"));
        }

        let drained = match call(&mut ctx, 29, [fd, SCRATCH, 16, 0]) {
            Some(n) if n >= 0 => n as usize,
            other => return SafetyResult::Fail(format!("drain gave {:?}", other)),
        };
        let mut raw = vec![0u8; drained];
        ctx.mem.read_bytes(SCRATCH, &mut raw);

        let events: Vec<userlib::trace::SyscallEvent> =
            userlib::trace::SyscallEvents::new(&raw).collect();
        if events.len() != 2 {
            return SafetyResult::Fail(format!("expected 2 events, parsed {}", events.len()));
        }
        if events[0].id != 2 || !events[0].args().is_empty() {
            return SafetyResult::Fail(format!("first event wrong: {:?}", events[0]));
        }
        if events[1].id != 7 || events[1].args() != [500] {
            return SafetyResult::Fail(format!("second event wrong: {:?}", events[1]));
        }
        SafetyResult::Pass
    }
}

/// Run all safety checks
pub fn run_all_tests() -> Vec<(String, SafetyResult)> {
    let mut results = Vec::new();

    let mut checks: Vec<Box<dyn SafetyCheck>> = vec![
        Box::new(RingAccountingCheck),
        Box::new(WrapReassemblyCheck),
        Box::new(FilteredTracingCheck),
        Box::new(PatchRestoreCheck),
        Box::new(EnableIdempotenceCheck),
        Box::new(RegistryCapacityCheck),
        Box::new(BacktraceDepthCheck),
        Box::new(MutexedSinkCheck),
        Box::new(ShadowPatchCheck),
        Box::new(AbiRoundTripCheck),
    ];

    for check in checks.iter_mut() {
        let result = check.run();
        results.push((String::from(check.name()), result));
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_passes(mut check: impl SafetyCheck) {
        let result = check.run();
        assert!(result.passed(), "{}: {:?}", check.name(), result);
    }

    #[test]
    fn test_ring_accounting() {
        assert_passes(RingAccountingCheck);
    }

    #[test]
    fn test_wrap_reassembly() {
        assert_passes(WrapReassemblyCheck);
    }

    #[test]
    fn test_filtered_tracing() {
        assert_passes(FilteredTracingCheck);
    }

    #[test]
    fn test_patch_restore() {
        assert_passes(PatchRestoreCheck);
    }

    #[test]
    fn test_enable_idempotence() {
        assert_passes(EnableIdempotenceCheck);
    }

    #[test]
    fn test_registry_capacity() {
        assert_passes(RegistryCapacityCheck);
    }

    #[test]
    fn test_backtrace_depth() {
        assert_passes(BacktraceDepthCheck);
    }

    #[test]
    fn test_mutexed_sink() {
        assert_passes(MutexedSinkCheck);
    }

    #[test]
    fn test_shadow_patch() {
        assert_passes(ShadowPatchCheck);
    }

    #[test]
    fn test_abi_round_trip() {
        assert_passes(AbiRoundTripCheck);
    }

    #[test]
    fn test_run_all_reports_every_check() {
        let results = run_all_tests();
        assert_eq!(results.len(), 10);
        for (name, result) in results {
            assert!(result.passed(), "{} failed: {:?}", name, result);
        }
    }
}
