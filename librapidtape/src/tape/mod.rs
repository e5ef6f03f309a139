use std::io;

pub mod partition;
pub mod drive;
pub mod transport;
pub mod controller;
pub mod position;
pub mod status;
pub mod command;
pub mod registry;
pub mod handle;
pub mod emulated;

#[cfg(windows)]
pub mod windows;


pub use self::command::{TapeOp, OptionsRequest};
pub use self::controller::DriveController;
pub use self::drive::{DriveState, DriveOptions, DriveFeatures};
pub use self::handle::TapeHandle;
pub use self::partition::{Boundary, PartitionState};
pub use self::registry::DriveRegistry;
pub use self::status::{TapeStatus, GeneralStatus};
pub use self::transport::TransportBackend;

/// A tape unit as seen by command-line tools: a byte stream with control
/// commands on the side.
///
/// Everything beyond `execute` and `status` is a convenience built on
/// control commands.
pub trait TapeDevice : io::Write + io::Read {
    /// Execute one control command. `TapeOp::Tell` yields the current block.
    fn execute(&mut self, op: TapeOp) -> io::Result<Option<u64>>;

    fn status(&mut self) -> io::Result<TapeStatus>;

    /// Read exactly one tape block, sized up to the capacity of `buf`.
    ///
    /// A filemark or the end of data yields an empty block.
    fn read_block(&mut self, buf: &mut Vec<u8>) -> io::Result<()> {
        let capacity = buf.capacity();
        buf.resize(capacity, 0);

        let count = self.read(buf)?;
        buf.truncate(count);

        Ok(())
    }

    fn write_filemarks(&mut self, count: u32) -> io::Result<()> {
        self.execute(TapeOp::Weof(count)).map(|_| ())
    }

    /// Seek by a number of blocks on the tape.
    ///
    /// `Start` is a logical block number within the current partition.
    fn seek_blocks(&mut self, pos: io::SeekFrom) -> io::Result<()> {
        let res = match pos {
            io::SeekFrom::Start(target) => self.execute(TapeOp::Seek(target)),
            io::SeekFrom::Current(target) => self.execute(TapeOp::Fsr(target)),
            io::SeekFrom::End(target) => {
                self.execute(TapeOp::Eom)?;
                self.execute(TapeOp::Fsr(target))
            }
        };

        res.map(|_| ())
    }

    fn tell_blocks(&mut self) -> io::Result<u64> {
        Ok(self.execute(TapeOp::Tell)?.unwrap_or(0))
    }

    /// Seek by a number of filemarks on the tape.
    ///
    /// This function operates similarly to `seek`, but operates in units of
    /// filemarks instead. A filemark is the tape marking that divides files on
    /// a tape.
    ///
    /// All seek operations are relative to the current partition, if the tape
    /// has partitions.
    fn seek_filemarks(&mut self, pos: io::SeekFrom) -> io::Result<()> {
        let res = match pos {
            io::SeekFrom::Start(target) => {
                self.execute(TapeOp::Rewind)?;
                self.execute(TapeOp::Fsf(target as i64))
            },
            io::SeekFrom::Current(target) => self.execute(TapeOp::Fsf(target)),
            io::SeekFrom::End(target) => {
                self.execute(TapeOp::Eom)?;
                self.execute(TapeOp::Fsf(target))
            }
        };

        res.map(|_| ())
    }

    /// Seek by a number of setmarks on the tape.
    ///
    /// Not many tape formats support setmarks, so check the drive's features
    /// before relying on this.
    fn seek_setmarks(&mut self, pos: io::SeekFrom) -> io::Result<()> {
        let res = match pos {
            io::SeekFrom::Start(target) => {
                self.execute(TapeOp::Rewind)?;
                self.execute(TapeOp::Fss(target as i64))
            },
            io::SeekFrom::Current(target) => self.execute(TapeOp::Fss(target)),
            io::SeekFrom::End(target) => {
                self.execute(TapeOp::Eom)?;
                self.execute(TapeOp::Fss(target))
            }
        };

        res.map(|_| ())
    }

    /// Switch to a new tape partition on the tape device.
    ///
    /// # Parameters
    ///
    /// `id` is the ID of the tape partition, numbered from 1. An ID of 0 is a
    /// null operation.
    fn seek_partition(&mut self, id: u32) -> io::Result<()> {
        if id == 0 {
            return Ok(());
        }

        self.execute(TapeOp::SetPartition(id as i64 - 1)).map(|_| ())
    }
}
