//! Console component trait
//!
//! The minimal character-output interface the kernel core needs for its
//! diagnostic path. The UART driver behind it belongs to the surrounding
//! system; the core only ever calls `putc`.

use core::fmt;

/// Console trait for kernel diagnostic output
pub trait Console: Send + Sync {
    /// Write a single byte, blocking until the device accepts it
    fn putc(&self, c: u8);

    /// Write a string
    ///
    /// Default implementation writes byte by byte and expands `\n` to CRLF.
    fn puts(&self, s: &str) {
        for byte in s.bytes() {
            if byte == b'\n' {
                self.putc(b'\r');
            }
            self.putc(byte);
        }
    }
}

impl<C: Console + ?Sized> Console for &C {
    fn putc(&self, c: u8) {
        (**self).putc(c)
    }

    fn puts(&self, s: &str) {
        (**self).puts(s)
    }
}

/// Adapter for using a `Console` with `core::fmt::Write`
pub struct ConsoleWriter<'a, C: Console + ?Sized> {
    console: &'a C,
}

impl<'a, C: Console + ?Sized> ConsoleWriter<'a, C> {
    pub const fn new(console: &'a C) -> Self {
        Self { console }
    }
}

impl<C: Console + ?Sized> fmt::Write for ConsoleWriter<'_, C> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.console.puts(s);
        Ok(())
    }
}

pub mod null;

pub use null::NullConsole;
