//! Debug console logging
//!
//! A `log` backend for threads that have nothing but the kernel debug
//! console. Each record is written as `PREFIX|LEVEL: message\n`, e.g.
//! `MON|ERROR: faulting PD: serial_driver`.

use core::fmt::{self, Write};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Byte sink, normally `seL4_DebugPutChar`
pub type PutChar = fn(u8);

/// `log::Log` implementation writing through a [`PutChar`] sink
pub struct DebugConsoleLogger {
    prefix: &'static str,
    level: LevelFilter,
    put_char: PutChar,
}

impl DebugConsoleLogger {
    pub const fn new(prefix: &'static str, level: LevelFilter, put_char: PutChar) -> Self {
        Self {
            prefix,
            level,
            put_char,
        }
    }

    /// Install as the global logger
    pub fn install(&'static self) -> Result<(), SetLoggerError> {
        log::set_logger(self)?;
        log::set_max_level(self.level);
        Ok(())
    }

    fn write_record(&self, record: &Record<'_>) -> fmt::Result {
        let mut out = Console(self.put_char);
        write!(
            out,
            "{}|{}: {}\n",
            self.prefix,
            level_tag(record.level()),
            record.args()
        )
    }
}

impl Log for DebugConsoleLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            // The console cannot fail; a formatting error only truncates the line.
            let _ = self.write_record(record);
        }
    }

    fn flush(&self) {}
}

struct Console(PutChar);

impl Write for Console {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            (self.0)(byte);
        }
        Ok(())
    }
}

const fn level_tag(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARN",
        Level::Info => "INFO",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}
