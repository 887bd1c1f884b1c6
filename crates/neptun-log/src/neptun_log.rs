use chrono::Local;
use log::{Level, Log, SetLoggerError};

pub static NEPTUN_LOGGER: NeptunLogger = NeptunLogger;

pub struct NeptunLogger;

impl NeptunLogger {
    /// Installs the logger and caps the log level.
    pub fn init(level: Level) -> Result<(), SetLoggerError> {
        log::set_logger(&NEPTUN_LOGGER)?;
        log::set_max_level(level.to_level_filter());
        Ok(())
    }
}

impl Log for NeptunLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            let now = Local::now();
            println!(
                "{} {} {}",
                now.format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}
