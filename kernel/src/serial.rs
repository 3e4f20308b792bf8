//! Serial console driver.
//!
//! The kernel talks to the outside world over COM1. Output is best effort:
//! until [`init`] has run every write is dropped, which keeps the macros safe
//! to call from any context, including hosted unit tests where no port
//! exists.

use core::fmt;

use spin::Mutex;
use uart_16550::SerialPort;

/// I/O base of the COM1 UART.
const COM1_BASE: u16 = 0x3F8;

static SERIAL1: Mutex<Option<SerialPort>> = Mutex::new(None);

/// Initialize the COM1 port. Called once during early boot.
pub fn init() {
    let mut port = unsafe { SerialPort::new(COM1_BASE) };
    port.init();
    *SERIAL1.lock() = Some(port);
}

/// Write a single byte to the console, dropping it if the port is not up.
pub fn write_byte(byte: u8) {
    if let Some(port) = SERIAL1.lock().as_mut() {
        port.send(byte);
    }
}

/// Write a string to the console.
pub fn write_str(s: &str) {
    for byte in s.bytes() {
        write_byte(byte);
    }
}

/// `fmt::Write` adapter over the console.
pub struct SerialWriter;

impl fmt::Write for SerialWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        write_str(s);
        Ok(())
    }
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    use fmt::Write;
    if SERIAL1.lock().is_none() {
        return;
    }
    x86_64::instructions::interrupts::without_interrupts(|| {
        let _ = SerialWriter.write_fmt(args);
    });
}

/// Print to the serial console.
#[macro_export]
macro_rules! serial_print {
    ($($arg:tt)*) => ($crate::serial::_print(format_args!($($arg)*)));
}

/// Print to the serial console, with a trailing newline.
#[macro_export]
macro_rules! serial_println {
    () => ($crate::serial_print!("\n"));
    ($fmt:expr) => ($crate::serial_print!(concat!($fmt, "\n")));
    ($fmt:expr, $($arg:tt)*) => ($crate::serial_print!(concat!($fmt, "\n"), $($arg)*));
}
