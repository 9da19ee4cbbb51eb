use crate::severity::LogSeverity;
use crate::systime::now;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Prints `log` records to stdout as `[SEVERITY] time target: message`.
pub struct StrataLogger;

static LOGGER: StrataLogger = StrataLogger;

impl StrataLogger {
    pub fn format(severity: LogSeverity, time: &str, target: &str, msg: &str) -> String {
        format!("[{}] {} {}: {}", severity, time, target, msg)
    }
}

impl Log for StrataLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        println!(
            "{}",
            Self::format(
                record.level().into(),
                &now(),
                record.target(),
                &record.args().to_string()
            )
        );
    }

    fn flush(&self) {}
}

/// Installs the logger for the process. Fails if another logger is already set.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}
