//! Control command dispatch.

use log::debug;
use crate::error::TapeError;
use crate::tape::controller::DriveController;
use crate::tape::drive::{DriveOptions, DriveFeatures, LockState};
use crate::tape::transport::{TransportBackend, TransportStatus, Status, PositionMethod, MarkKind, EraseKind, PrepareAction};

/// How far `Eom` spaces when the drive cannot skip to end of data by
/// itself.
const EOM_FILEMARKS : i64 = 32767;

/// One control command.
///
/// Counts are taken as given; spacing commands with a count of zero do
/// nothing.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum TapeOp {
    Reset,
    /// Space forward over filemarks.
    Fsf(i64),
    Bsf(i64),
    /// Space forward over blocks.
    Fsr(i64),
    Bsr(i64),
    /// Write filemarks.
    Weof(u32),
    Rewind,
    /// Rewind and unload.
    Offline,
    Nop,
    Retension,
    /// Space backward over filemarks, then forward onto the near side of
    /// the last one.
    Bsfm(i64),
    Fsfm(i64),
    /// Skip to the end of recorded data.
    Eom,
    Erase,
    Ras1,
    Ras2,
    Ras3,
    SetBlock(u32),
    /// Seek to a logical block.
    Seek(u64),
    Tell,
    /// Space over setmarks.
    Fss(i64),
    Bss(i64),
    /// Write setmarks.
    Wsm(u32),
    Lock,
    Unlock,
    Load,
    Compression(bool),
    SetPartition(i64),
    MakePartition(i64),
    SetDriveBuffer(OptionsRequest),
    SetDensity(u32)
}

impl TapeOp {
    /// Commands still accepted after a bus reset.
    ///
    /// These all establish a known position (or remove the medium) without
    /// depending on where we were.
    pub fn recovers_bus_reset(&self) -> bool {
        match self {
            TapeOp::Rewind | TapeOp::Offline | TapeOp::Retension | TapeOp::Erase | TapeOp::Seek(_) | TapeOp::Eom => true,
            _ => false
        }
    }
}

/// A driver options word, decoded.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum OptionsRequest {
    /// The legacy word: only toggles write buffering.
    BufferWrites(bool),
    /// Set every option to exactly this.
    Exact(DriveOptions),
    Set(DriveOptions),
    Clear(DriveOptions),
    /// End-of-tape warning zone size, in the drive's units.
    EotWarningZone(u32)
}

const OPTIONS_MODE_MASK : u32 = 0xf000_0000;
const OPTIONS_LEGACY : u32 = 0x0000_0000;
const OPTIONS_BOOLEANS : u32 = 0x1000_0000;
const OPTIONS_SETBOOLEANS : u32 = 0x3000_0000;
const OPTIONS_CLEARBOOLEANS : u32 = 0x4000_0000;
const OPTIONS_EOT_WZ : u32 = 0xf000_0000;

impl OptionsRequest {
    /// Decode a raw mtio options word. The top nibble selects the mode.
    pub fn from_raw(word: u32) -> Option<OptionsRequest> {
        let value = word & !OPTIONS_MODE_MASK;

        match word & OPTIONS_MODE_MASK {
            OPTIONS_LEGACY => match value {
                0 => Some(OptionsRequest::BufferWrites(false)),
                1 => Some(OptionsRequest::BufferWrites(true)),
                _ => None
            },
            OPTIONS_BOOLEANS => Some(OptionsRequest::Exact(DriveOptions::from_bits_truncate(value))),
            OPTIONS_SETBOOLEANS => Some(OptionsRequest::Set(DriveOptions::from_bits_truncate(value))),
            OPTIONS_CLEARBOOLEANS => Some(OptionsRequest::Clear(DriveOptions::from_bits_truncate(value))),
            OPTIONS_EOT_WZ => Some(OptionsRequest::EotWarningZone(value)),
            _ => None
        }
    }
}

impl<'a, T: TransportBackend + ?Sized> DriveController<'a, T> {
    /// Execute one control command.
    ///
    /// `Tell` answers with the current block; every other command answers
    /// with nothing.
    ///
    /// While a bus reset is outstanding only the commands that re-establish
    /// a position are accepted. The first of them also re-takes a lock that
    /// was held before the reset.
    pub fn command(&mut self, op: TapeOp) -> Result<Option<u64>, TapeError> {
        if self.drive.last_error == Some(TransportStatus::BusReset) {
            if !op.recovers_bus_reset() {
                return Err(TapeError::BusReset);
            }

            if self.drive.lock.is_held() {
                let automatic = self.drive.lock == LockState::AutoLocked;

                if self.prepare_raw(PrepareAction::Lock, automatic).is_err() {
                    debug!("tape{}: couldn't relock drive after bus reset", self.drive.unit);
                    self.drive.lock = LockState::Unlocked;
                }
            }
        }

        if op == TapeOp::Tell {
            return self.tell();
        }

        let res = self.dispatch(op);
        self.finish(res).map(|_| None)
    }

    fn dispatch(&mut self, op: TapeOp) -> Status {
        match op {
            TapeOp::Reset | TapeOp::Nop | TapeOp::Tell => Ok(()),
            TapeOp::Fsf(count) => self.set_pos(PositionMethod::Filemarks, count, false),
            TapeOp::Bsf(count) => self.set_pos(PositionMethod::Filemarks, count.saturating_neg(), false),
            TapeOp::Fsfm(count) => self.set_pos(PositionMethod::Filemarks, count, true),
            TapeOp::Bsfm(count) => self.set_pos(PositionMethod::Filemarks, count.saturating_neg(), true),
            TapeOp::Fsr(count) => self.set_pos(PositionMethod::RelativeBlocks, count, false),
            TapeOp::Bsr(count) => self.set_pos(PositionMethod::RelativeBlocks, count.saturating_neg(), false),
            TapeOp::Fss(count) => self.set_pos(PositionMethod::Setmarks, count, false),
            TapeOp::Bss(count) => self.set_pos(PositionMethod::Setmarks, count.saturating_neg(), false),
            TapeOp::Weof(count) => self.write_marks_raw(MarkKind::Filemarks, count),
            TapeOp::Wsm(count) => self.write_marks_raw(MarkKind::Setmarks, count),
            TapeOp::Rewind => self.set_pos(PositionMethod::Rewind, 0, false),
            TapeOp::Offline => self.prepare_raw(PrepareAction::Unload, false),
            TapeOp::Load => self.prepare_raw(PrepareAction::Load, false),
            TapeOp::Lock => self.prepare_raw(PrepareAction::Lock, false),
            TapeOp::Unlock => self.prepare_raw(PrepareAction::Unlock, false),
            TapeOp::Retension => {
                if !self.drive.has_feature(DriveFeatures::TENSION) {
                    return Err(TransportStatus::InvalidParameter);
                }

                self.set_pos(PositionMethod::Rewind, 0, false)?;
                self.prepare_raw(PrepareAction::Tension, false)
            },
            TapeOp::Eom => {
                if self.drive.has_option(DriveOptions::FAST_EOM) && self.drive.has_feature(DriveFeatures::END_OF_DATA) {
                    self.set_pos(PositionMethod::EndOfData, 0, false)
                } else {
                    self.set_pos(PositionMethod::Filemarks, EOM_FILEMARKS, false)
                }
            },
            TapeOp::Erase => self.erase_raw(EraseKind::Long),
            TapeOp::Ras1 | TapeOp::Ras2 | TapeOp::Ras3 | TapeOp::SetDensity(_) => Err(TransportStatus::InvalidParameter),
            TapeOp::SetBlock(size) => self.set_block(size),
            TapeOp::Seek(block) => {
                if self.drive.has_feature(DriveFeatures::LOGICAL_BLK) {
                    self.set_pos(PositionMethod::LogicalBlock, block as i64, false)
                } else {
                    self.get_pos()?;

                    let current = self.drive.block.unwrap_or(0);
                    self.set_pos(PositionMethod::RelativeBlocks, block as i64 - current as i64, false)
                }
            },
            TapeOp::Compression(enable) => self.set_compression_raw(enable),
            TapeOp::SetPartition(index) => self.set_partition_raw(index),
            TapeOp::MakePartition(count) => self.create_partitions_raw(count),
            TapeOp::SetDriveBuffer(request) => self.set_options_raw(request)
        }
    }

    /// Validate a block size change against what the drive can do before
    /// asking for it.
    fn set_block(&mut self, size: u32) -> Status {
        let dp = self.drive.drive_params;

        if !self.drive.has_feature(DriveFeatures::SET_BLOCK_SIZE) {
            return Err(TransportStatus::InvalidParameter);
        }

        if size == self.drive.block_size() {
            return Ok(());
        }

        if size == 0 && !self.drive.has_feature(DriveFeatures::VARIABLE_BLOCK) {
            return Err(TransportStatus::InvalidParameter);
        }

        if size > 0 && (size < dp.minimum_block_size || size > dp.maximum_block_size) {
            return Err(TransportStatus::InvalidParameter);
        }

        match self.set_blocksize_raw(size) {
            Err(TransportStatus::InvalidFunction) => Err(TransportStatus::InvalidBlockLength),
            res => res
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{OptionsRequest, TapeOp};
    use crate::tape::drive::DriveOptions;

    #[test]
    fn options_word_modes() {
        assert_eq!(OptionsRequest::from_raw(0), Some(OptionsRequest::BufferWrites(false)));
        assert_eq!(OptionsRequest::from_raw(1), Some(OptionsRequest::BufferWrites(true)));
        assert_eq!(OptionsRequest::from_raw(2), None);
        assert_eq!(OptionsRequest::from_raw(0x1000_0011), Some(OptionsRequest::Exact(DriveOptions::BUFFER_WRITES | DriveOptions::TWO_FM)));
        assert_eq!(OptionsRequest::from_raw(0x3001_0000), Some(OptionsRequest::Set(DriveOptions::ECC)));
        assert_eq!(OptionsRequest::from_raw(0x4000_1000), Some(OptionsRequest::Clear(DriveOptions::SYSV)));
        assert_eq!(OptionsRequest::from_raw(0xf000_0400), Some(OptionsRequest::EotWarningZone(0x400)));
        assert_eq!(OptionsRequest::from_raw(0x2000_0000), None);
    }

    #[test]
    fn bus_reset_recovery_set() {
        assert!(TapeOp::Rewind.recovers_bus_reset());
        assert!(TapeOp::Offline.recovers_bus_reset());
        assert!(TapeOp::Seek(12).recovers_bus_reset());
        assert!(TapeOp::Eom.recovers_bus_reset());
        assert!(!TapeOp::Fsf(1).recovers_bus_reset());
        assert!(!TapeOp::Weof(1).recovers_bus_reset());
        assert!(!TapeOp::Tell.recovers_bus_reset());
    }
}
