//! Platform selection of tape transports.

use std::io;
use crate::tape::{TapeDevice, TapeHandle, DriveRegistry};
use crate::tape::emulated::EmulatedTape;

#[cfg(windows)]
pub mod windows;

#[cfg(windows)]
pub use crate::fs::windows::open_native;

/// Name prefix selecting the in-memory tape unit.
pub const EMULATED_DEVICE : &str = "emulated";

/// The unit number a device name refers to: its trailing digits, or unit 0.
pub fn unit_number(name: &str) -> usize {
    let digits = name.len() - name.trim_end_matches(|c: char| c.is_ascii_digit()).len();

    name[name.len() - digits..].parse().unwrap_or(0)
}

/// Open a tape device by name.
///
/// `emulated` (optionally followed by a unit number, as in `emulated1`)
/// opens a blank in-memory tape. Every other name is handed to the platform
/// tape driver; platforms without one only support emulated tapes.
pub fn open_tape(name: &str, rewind_on_close: bool) -> io::Result<Box<dyn TapeDevice>> {
    let unit = unit_number(name);

    if name.starts_with(EMULATED_DEVICE) {
        let handle = TapeHandle::open(DriveRegistry::global(), unit, EmulatedTape::new(), rewind_on_close)?;

        return Ok(Box::new(handle));
    }

    open_platform(name, unit, rewind_on_close)
}

#[cfg(windows)]
fn open_platform(name: &str, unit: usize, rewind_on_close: bool) -> io::Result<Box<dyn TapeDevice>> {
    let transport = open_native(name)?;

    Ok(Box::new(TapeHandle::open(DriveRegistry::global(), unit, transport, rewind_on_close)?))
}

#[cfg(not(windows))]
fn open_platform(name: &str, _unit: usize, _rewind_on_close: bool) -> io::Result<Box<dyn TapeDevice>> {
    Err(io::Error::new(io::ErrorKind::NotFound, format!("no tape driver for {} on this platform; use {}", name, EMULATED_DEVICE)))
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use super::{unit_number, open_tape};
    use crate::tape::TapeOp;

    #[test]
    fn unit_numbers() {
        assert_eq!(unit_number("\\\\.\\TAPE3"), 3);
        assert_eq!(unit_number("emulated"), 0);
        assert_eq!(unit_number("emulated7"), 7);
    }

    #[test]
    fn emulated_tape_opens() {
        let mut tape = open_tape("emulated5", false).unwrap();

        assert_eq!(tape.write(b"hello").unwrap(), 5);
        assert_eq!(tape.execute(TapeOp::Tell).unwrap(), Some(1));
    }
}
