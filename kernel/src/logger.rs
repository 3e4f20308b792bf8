//! Kernel logger backed by the serial console.
//!
//! Routes the `log` crate's macros to COM1. The `trace-events` feature raises
//! the level filter so per-event tracer logging becomes visible.

use log::{Level, LevelFilter, Log, Metadata, Record};

struct SerialLogger;

impl Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            crate::serial_println!("[{:>5}] {}: {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: SerialLogger = SerialLogger;

fn max_level() -> Level {
    if cfg!(feature = "trace-events") {
        Level::Trace
    } else {
        Level::Debug
    }
}

/// Install the serial logger. Safe to call more than once; only the first
/// call takes effect.
pub fn init() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(max_level().to_level_filter());
    }
}
