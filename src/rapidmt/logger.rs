use log::{Log, Metadata, Record, LevelFilter, SetLoggerError};

struct StderrLogger;

static LOGGER : StderrLogger = StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("{}: {}: {}", record.target(), record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Log level for a number of `-v` flags. Warnings are always shown.
pub fn level_for(verbosity: usize) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace
    }
}

/// Install the stderr logger. Only the first call in a process succeeds.
pub fn init(verbosity: usize) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level_for(verbosity));

    Ok(())
}

#[cfg(test)]
mod tests {
    use log::LevelFilter;
    use super::level_for;

    #[test]
    fn verbosity_levels() {
        assert_eq!(level_for(0), LevelFilter::Warn);
        assert_eq!(level_for(2), LevelFilter::Debug);
        assert_eq!(level_for(9), LevelFilter::Trace);
    }
}
