//! Open handles on tape units.

use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use log::debug;
use crate::error::TapeError;
use crate::result::PartialResult;
use crate::result::PartialResult::{Complete, Partial, Failure};
use crate::tape::TapeDevice;
use crate::tape::command::TapeOp;
use crate::tape::controller::DriveController;
use crate::tape::drive::DriveState;
use crate::tape::registry::DriveRegistry;
use crate::tape::status::TapeStatus;
use crate::tape::transport::TransportBackend;

/// One open handle on a tape unit.
///
/// The unit's state is shared with every other handle on the same unit and
/// is locked for the duration of each operation. Dropping the handle closes
/// it, writing a trailing filemark if data was written.
pub struct TapeHandle<T: TransportBackend> {
    drive: Arc<Mutex<DriveState>>,
    transport: T,
    rewind_on_close: bool,
    closed: bool
}

impl<T: TransportBackend> TapeHandle<T> {
    /// Open `unit` of the registry through `transport`.
    ///
    /// A unit without a medium still opens, so that a medium can be loaded
    /// through it; the failure is only logged.
    pub fn open(registry: &DriveRegistry, unit: usize, transport: T, rewind_on_close: bool) -> Result<TapeHandle<T>, TapeError> {
        let mut handle = TapeHandle {
            drive: registry.drive(unit)?,
            transport: transport,
            rewind_on_close: rewind_on_close,
            closed: false
        };

        if let Err(err) = handle.with_controller(|c| c.open()) {
            debug!("tape{}: open: {}", unit, err);
        }

        Ok(handle)
    }

    /// Open `unit`, then position it to append to the current file.
    pub fn open_for_append(registry: &DriveRegistry, unit: usize, transport: T, rewind_on_close: bool) -> Result<TapeHandle<T>, TapeError> {
        let mut handle = TapeHandle::open(registry, unit, transport, rewind_on_close)?;

        handle.with_controller(|c| c.open_for_append())?;

        Ok(handle)
    }

    /// Run `op` with the unit locked.
    pub fn with_controller<R, F: FnOnce(&mut DriveController<T>) -> R>(&mut self, op: F) -> R {
        let mut drive = self.drive.lock().unwrap_or_else(PoisonError::into_inner);
        let mut controller = DriveController::new(&mut drive, &mut self.transport);

        op(&mut controller)
    }

    /// A copy of the unit's current state.
    pub fn drive_state(&self) -> DriveState {
        self.drive.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn read_tape(&mut self, buf: &mut [u8]) -> Result<usize, TapeError> {
        self.ensure_open()?;
        self.with_controller(|c| c.read(buf))
    }

    pub fn write_tape(&mut self, buf: &[u8]) -> PartialResult<usize, TapeError> {
        if let Err(err) = self.ensure_open() {
            return Failure(err);
        }

        self.with_controller(|c| c.write(buf))
    }

    pub fn command(&mut self, op: TapeOp) -> Result<Option<u64>, TapeError> {
        self.ensure_open()?;
        self.with_controller(|c| c.command(op))
    }

    pub fn get_status(&mut self) -> TapeStatus {
        self.with_controller(|c| c.get_status())
    }

    /// Current absolute block, or `None` if the drive can't tell.
    pub fn position(&mut self) -> Result<Option<u64>, TapeError> {
        self.ensure_open()?;
        self.with_controller(|c| c.tell())
    }

    /// Close the handle, terminating written data and rewinding if this is a
    /// rewinding handle.
    pub fn close(mut self) -> Result<(), TapeError> {
        self.close_inner()
    }

    fn close_inner(&mut self) -> Result<(), TapeError> {
        self.ensure_open()?;
        self.closed = true;

        let rewind = self.rewind_on_close;
        self.with_controller(|c| c.close(rewind))
    }

    fn ensure_open(&self) -> Result<(), TapeError> {
        if self.closed { Err(TapeError::Closed) } else { Ok(()) }
    }
}

impl<T: TransportBackend> Drop for TapeHandle<T> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(err) = self.close_inner() {
                debug!("tape close on drop: {}", err);
            }
        }
    }
}

impl<T: TransportBackend> io::Read for TapeHandle<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_tape(buf)?)
    }
}

impl<T: TransportBackend> io::Write for TapeHandle<T> {
    /// Bytes that reached the medium are always reported as written; an
    /// end-of-medium warning that came with them surfaces on the next
    /// write instead.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.write_tape(buf) {
            Complete(count) => Ok(count),
            Partial(count, _) if count > 0 => Ok(count),
            Partial(_, err) | Failure(err) => Err(err.into())
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<T: TransportBackend> io::Seek for TapeHandle<T> {
    /// Seek by bytes. Only meaningful with a fixed block size, where byte
    /// offsets map onto whole blocks; seeking to the end skips to the next
    /// filemark.
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let block_size = self.drive_state().block_size() as i64;

        if block_size == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "byte seeks need a fixed block size"));
        }

        let spacing = match pos {
            io::SeekFrom::Start(offset) => {
                let current = self.position()?.unwrap_or(0);
                offset as i64 / block_size - current as i64
            },
            io::SeekFrom::Current(offset) => offset / block_size,
            io::SeekFrom::End(offset) => {
                self.command(TapeOp::Fsf(1))?;
                offset / block_size
            }
        };

        if spacing > 0 {
            self.command(TapeOp::Fsr(spacing))?;
        } else if spacing < 0 {
            self.command(TapeOp::Bsr(-spacing))?;
        }

        Ok(self.position()?.unwrap_or(0) * block_size as u64)
    }
}

impl<T: TransportBackend> TapeDevice for TapeHandle<T> {
    fn execute(&mut self, op: TapeOp) -> io::Result<Option<u64>> {
        Ok(self.command(op)?)
    }

    fn status(&mut self) -> io::Result<TapeStatus> {
        self.ensure_open()?;
        Ok(self.get_status())
    }
}
