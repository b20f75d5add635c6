//! Debug output and logging
//!
//! The core reports through the `log` facade. The surrounding kernel decides
//! where records go; on hardware that is a `ConsoleLogger` wrapping the UART
//! console, installed once during boot with [`init`].

use core::fmt::Write;

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

use crate::components::console::{Console, ConsoleWriter};

/// Print to a console
#[macro_export]
macro_rules! kprint {
    ($console:expr, $($arg:tt)*) => ({
        use core::fmt::Write;
        let _ = write!($crate::components::console::ConsoleWriter::new($console), $($arg)*);
    });
}

/// Print to a console, with a newline
#[macro_export]
macro_rules! kprintln {
    ($console:expr) => ($crate::kprint!($console, "\n"));
    ($console:expr, $($arg:tt)*) => ({
        use core::fmt::Write;
        let _ = writeln!($crate::components::console::ConsoleWriter::new($console), $($arg)*);
    });
}

/// Heap trace record, compiled in with `debug-heap`
macro_rules! kheap_trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "debug-heap")]
        log::trace!(target: "heap", $($arg)*);
    };
}

/// Scheduler trace record, compiled in with `debug-scheduler`
macro_rules! ksched_trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "debug-scheduler")]
        log::trace!(target: "sched", $($arg)*);
    };
}

/// `log` sink that formats records onto a console
///
/// Output format: `[LEVEL target] message`.
pub struct ConsoleLogger<C: Console> {
    console: C,
    level: LevelFilter,
}

impl<C: Console> ConsoleLogger<C> {
    pub const fn new(console: C, level: LevelFilter) -> Self {
        Self { console, level }
    }

    /// Maximum level this logger emits
    pub fn level(&self) -> LevelFilter {
        self.level
    }
}

impl<C: Console> Log for ConsoleLogger<C> {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut out = ConsoleWriter::new(&self.console);
        let _ = writeln!(out, "[{:<5} {}] {}", record.level(), record.target(), record.args());
    }

    fn flush(&self) {}
}

/// Install `logger` as the global `log` sink
///
/// Fails if a logger was already installed.
pub fn init<C: Console>(logger: &'static ConsoleLogger<C>) -> Result<(), SetLoggerError> {
    log::set_logger(logger)?;
    log::set_max_level(logger.level());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;
    use std::string::String;
    use std::sync::Mutex;
    use std::vec::Vec;

    #[derive(Default)]
    struct Capture(Mutex<Vec<u8>>);

    impl Capture {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Console for Capture {
        fn putc(&self, c: u8) {
            self.0.lock().unwrap().push(c);
        }
    }

    #[test]
    fn test_logger_formats_level_and_target() {
        let logger = ConsoleLogger::new(Capture::default(), LevelFilter::Info);
        logger.log(
            &Record::builder()
                .level(Level::Error)
                .target("heap")
                .args(format_args!("out of memory ({} bytes)", 64))
                .build(),
        );
        assert_eq!(logger.console.text(), "[ERROR heap] out of memory (64 bytes)\r\n");
    }

    #[test]
    fn test_logger_filters_by_level() {
        let logger = ConsoleLogger::new(Capture::default(), LevelFilter::Warn);
        logger.log(
            &Record::builder()
                .level(Level::Debug)
                .target("sched")
                .args(format_args!("idle"))
                .build(),
        );
        assert!(logger.console.text().is_empty());
    }

    #[test]
    fn test_kprintln_macro() {
        let console = Capture::default();
        kprintln!(&console, "task {} ready", 3);
        kprint!(&console, "x");
        assert_eq!(console.text(), "task 3 ready\r\nx");
    }
}
