extern crate log;
extern crate bitflags;
extern crate thiserror;
extern crate lazy_static;

#[cfg(windows)]
extern crate winapi;

/// Caller-facing error type for tape operations.
pub mod error;

/// Result type for operations which can transfer data and still fail.
pub mod result;

/// Position and boundary tracking for tape units, plus their transports.
pub mod tape;

/// Platform selection of tape transports.
pub mod fs;

pub mod tuning;

pub use crate::error::TapeError;
pub use crate::result::PartialResult;
