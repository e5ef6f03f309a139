//! Windows-specific tape opening.

use std::{io, ffi};
use winapi::shared::winerror::ERROR_MEDIA_CHANGED;
use crate::tape::windows::WindowsTransport;

/// Open an NT tape device.
///
/// A bare number or `TAPEn` is expanded into the full device path.
pub fn open_native(name: &str) -> io::Result<WindowsTransport> {
    let path = if name.starts_with("\\\\") {
        name.to_string()
    } else {
        format!("\\\\.\\TAPE{}", super::unit_number(name))
    };

    //Windows does this fun thing where tape devices throw an error if you've
    //changed the media out, so we absorb up to five of these spurious errors
    //when opening up a new tape
    let mut changed_count = 0;

    loop {
        match WindowsTransport::open_device(&ffi::OsString::from(path.clone())) {
            Ok(tape) => return Ok(tape),
            Err(e) => {
                match e.raw_os_error() {
                    Some(errcode) if errcode == ERROR_MEDIA_CHANGED as i32 => {
                        changed_count += 1;
                    },
                    _ => return Err(e)
                }

                if changed_count > 5 {
                    return Err(e);
                }
            }
        }
    }
}
