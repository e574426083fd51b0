use crate::qemu_fmt::DebugConsole;
use core::fmt::{self, Write};
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// `log` backend that writes to the QEMU debug console.
pub struct QemuLogger {
    max_level: LevelFilter,
}

static LOGGER: QemuLogger = QemuLogger::new(LevelFilter::Trace);

impl QemuLogger {
    #[must_use]
    pub const fn new(max_level: LevelFilter) -> Self {
        Self { max_level }
    }

    /// Install the logger and set the global level filter.
    ///
    /// Call once during early init; later calls fail with [`SetLoggerError`].
    ///
    /// # Errors
    /// If another logger is already installed.
    pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_logger(&LOGGER)?;
        log::set_max_level(level);
        Ok(())
    }
}

/// Format a record as `"[LEVEL] target: message\n"`.
///
/// # Errors
/// Propagates errors of the underlying writer.
pub fn format_record<W: Write>(w: &mut W, record: &Record) -> fmt::Result {
    writeln!(w, "[{}] {}: {}", record.level(), record.target(), record.args())
}

impl Log for QemuLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let _ = format_record(&mut DebugConsole, record);
    }

    fn flush(&self) {}
}
