/// User-input byte sizes with binary suffixes.
pub mod units;

/// Operation names accepted on the command line and the tape commands they
/// stand for.
pub mod command;

/// Human-readable drive status reports.
pub mod report;

/// Minimal stderr logger for the command-line tools.
pub mod logger;
