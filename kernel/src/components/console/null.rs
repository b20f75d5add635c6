//! Null console (no output)
//!
//! Discards everything. Used when a build has no UART or when the
//! diagnostic path should be silenced.

use super::Console;

/// Console that discards all output
#[derive(Debug, Clone, Copy, Default)]
pub struct NullConsole;

impl NullConsole {
    pub const fn new() -> Self {
        Self
    }
}

impl Console for NullConsole {
    #[inline(always)]
    fn putc(&self, _c: u8) {}

    #[inline(always)]
    fn puts(&self, _s: &str) {}
}
