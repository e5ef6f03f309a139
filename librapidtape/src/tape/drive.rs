//! Per-unit drive state.

use bitflags::bitflags;
use crate::tape::partition::{PartitionState, offset};
use crate::tape::transport::TransportStatus;

/// Upper bound on partitions tracked per unit, whatever the drive claims.
pub const MAX_PARTITIONS: usize = 64;

/// What the last I/O since the last clean point was.
///
/// Ordered: close writes marks for anything at or past `HasWritten`.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum PendingWrite {
    Clean,
    HasRead,
    HasWritten,
    AsyncWritePending
}

/// Whether the medium is locked in the drive, and who locked it.
///
/// Ordered so that anything at or past `AutoLocked` means a lock is held.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum LockState {
    Unlocked,
    LockError,
    AutoLocked,
    Locked
}

impl LockState {
    pub fn is_held(self) -> bool {
        self >= LockState::AutoLocked
    }
}

bitflags! {
    /// Driver behavior switches, plus the three hardware-backed parameters
    /// that travel in the same option word.
    ///
    /// Bit values are the traditional mtio `MT_ST_*` option bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DriveOptions: u32 {
        const BUFFER_WRITES = 0x0001;
        const ASYNC_WRITES = 0x0002;
        const TWO_FM = 0x0010;
        const FAST_EOM = 0x0020;
        const AUTO_LOCK = 0x0040;
        /// Close after reading moves past the next filemark.
        const SYSV = 0x1000;
        /// Positioning, load and unload calls return without waiting.
        const NOWAIT = 0x2000;

        const ECC = 0x0001_0000;
        const PADDING = 0x0002_0000;
        const REPORT_SETMARKS = 0x0004_0000;
    }
}

impl DriveOptions {
    /// The switches kept by the driver itself.
    pub fn driver() -> DriveOptions {
        DriveOptions::BUFFER_WRITES | DriveOptions::ASYNC_WRITES | DriveOptions::TWO_FM
            | DriveOptions::FAST_EOM | DriveOptions::AUTO_LOCK | DriveOptions::SYSV
            | DriveOptions::NOWAIT
    }

    /// The switches kept by the drive hardware.
    pub fn hardware() -> DriveOptions {
        DriveOptions::ECC | DriveOptions::PADDING | DriveOptions::REPORT_SETMARKS
    }
}

impl Default for DriveOptions {
    fn default() -> Self {
        DriveOptions::BUFFER_WRITES
    }
}

bitflags! {
    /// Drive capabilities.
    ///
    /// The low word uses the NT `TAPE_DRIVE_*` low feature bits as-is; the
    /// high word holds the high feature bits with their marker bit dropped.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DriveFeatures: u64 {
        const FIXED = 0x0000_0001;
        const SELECT = 0x0000_0002;
        const INITIATOR = 0x0000_0004;
        const ERASE_SHORT = 0x0000_0010;
        const ERASE_LONG = 0x0000_0020;
        const ERASE_BOP_ONLY = 0x0000_0040;
        const ERASE_IMMEDIATE = 0x0000_0080;
        const TAPE_CAPACITY = 0x0000_0100;
        const TAPE_REMAINING = 0x0000_0200;
        const FIXED_BLOCK = 0x0000_0400;
        const VARIABLE_BLOCK = 0x0000_0800;
        const WRITE_PROTECT = 0x0000_1000;
        const EOT_WZ_SIZE = 0x0000_2000;
        const ECC = 0x0001_0000;
        const COMPRESSION = 0x0002_0000;
        const PADDING = 0x0004_0000;
        const REPORT_SMKS = 0x0008_0000;
        const GET_ABSOLUTE_BLK = 0x0010_0000;
        const GET_LOGICAL_BLK = 0x0020_0000;
        const SET_EOT_WZ_SIZE = 0x0040_0000;
        const EJECT_MEDIA = 0x0100_0000;
        const CLEAN_REQUESTS = 0x0200_0000;
        const SET_CMP_BOP_ONLY = 0x0400_0000;

        const LOAD_UNLOAD = 0x0000_0001 << 32;
        const TENSION = 0x0000_0002 << 32;
        const LOCK_UNLOCK = 0x0000_0004 << 32;
        const REWIND_IMMEDIATE = 0x0000_0008 << 32;
        const SET_BLOCK_SIZE = 0x0000_0010 << 32;
        const LOAD_UNLD_IMMED = 0x0000_0020 << 32;
        const TENSION_IMMED = 0x0000_0040 << 32;
        const LOCK_UNLK_IMMED = 0x0000_0080 << 32;
        const SET_ECC = 0x0000_0100 << 32;
        const SET_COMPRESSION = 0x0000_0200 << 32;
        const SET_PADDING = 0x0000_0400 << 32;
        const SET_REPORT_SMKS = 0x0000_0800 << 32;
        const ABSOLUTE_BLK = 0x0000_1000 << 32;
        const ABS_BLK_IMMED = 0x0000_2000 << 32;
        const LOGICAL_BLK = 0x0000_4000 << 32;
        const LOG_BLK_IMMED = 0x0000_8000 << 32;
        const END_OF_DATA = 0x0001_0000 << 32;
        const RELATIVE_BLKS = 0x0002_0000 << 32;
        const FILEMARKS = 0x0004_0000 << 32;
        const SEQUENTIAL_FMKS = 0x0008_0000 << 32;
        const SETMARKS = 0x0010_0000 << 32;
        const SEQUENTIAL_SMKS = 0x0020_0000 << 32;
        const REVERSE_POSITION = 0x0040_0000 << 32;
        const SPACE_IMMEDIATE = 0x0080_0000 << 32;
        const WRITE_SETMARKS = 0x0100_0000 << 32;
        const WRITE_FILEMARKS = 0x0200_0000 << 32;
        const WRITE_SHORT_FMKS = 0x0400_0000 << 32;
        const WRITE_LONG_FMKS = 0x0800_0000 << 32;
        const WRITE_MARK_IMMED = 0x1000_0000 << 32;
        const FORMAT = 0x2000_0000 << 32;
        const FORMAT_IMMEDIATE = 0x4000_0000 << 32;
    }
}

impl DriveFeatures {
    pub fn low_word(self) -> u32 {
        self.bits() as u32
    }

    pub fn high_word(self) -> u32 {
        (self.bits() >> 32) as u32
    }
}

/// Cached capabilities and settings of the drive.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct DriveParameters {
    pub ecc: bool,
    pub compression: bool,
    pub data_padding: bool,
    pub report_setmarks: bool,
    pub default_block_size: u32,
    pub maximum_block_size: u32,
    pub minimum_block_size: u32,
    pub maximum_partition_count: u32,
    pub features: DriveFeatures,
    pub eot_warning_zone_size: u32
}

impl Default for DriveParameters {
    fn default() -> Self {
        DriveParameters {
            ecc: false,
            compression: false,
            data_padding: false,
            report_setmarks: false,
            default_block_size: 0,
            maximum_block_size: 0,
            minimum_block_size: 0,
            maximum_partition_count: 0,
            features: DriveFeatures::empty(),
            eot_warning_zone_size: 0
        }
    }
}

/// Cached parameters of the mounted medium.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct MediaParameters {
    pub capacity: u64,
    pub remaining: u64,
    /// Current block size; zero means variable-size blocks.
    pub block_size: u32,
    pub partition_count: u32,
    pub write_protected: bool
}

/// Everything we remember about one tape unit between operations.
#[derive(Clone, Debug)]
pub struct DriveState {
    pub unit: usize,
    /// Index of the active partition.
    pub partition: u32,
    /// Absolute block number, if known.
    pub block: Option<u64>,
    pub pending: PendingWrite,
    pub lock: LockState,
    pub options: DriveOptions,
    pub drive_params: DriveParameters,
    pub media_params: MediaParameters,
    /// Status of the last operation, as the transport reported it after
    /// classification. `None` means success.
    pub last_error: Option<TransportStatus>,
    partitions: [PartitionState; MAX_PARTITIONS]
}

impl DriveState {
    /// A unit seen for the first time.
    pub fn new(unit: usize, options: DriveOptions) -> DriveState {
        let mut drive = DriveState {
            unit: unit,
            partition: 0,
            block: None,
            pending: PendingWrite::Clean,
            lock: LockState::Unlocked,
            options: options & DriveOptions::driver(),
            drive_params: DriveParameters::default(),
            media_params: MediaParameters::default(),
            last_error: None,
            partitions: [PartitionState::unset(); MAX_PARTITIONS]
        };

        drive.initialize();
        drive
    }

    /// Forget all positional knowledge about the unit.
    ///
    /// Driver options survive; they belong to the unit, not the medium.
    pub fn initialize(&mut self) {
        self.partition = 0;
        self.block = None;
        self.lock = LockState::Unlocked;

        for part in self.partitions.iter_mut() {
            part.initialize(None);
        }
    }

    pub fn has_feature(&self, feature: DriveFeatures) -> bool {
        self.drive_params.features.contains(feature)
    }

    pub fn has_option(&self, option: DriveOptions) -> bool {
        self.options.contains(option)
    }

    pub fn set_option(&mut self, option: DriveOptions, value: bool) {
        self.options.set(option & DriveOptions::driver(), value);
    }

    /// Current block size of the medium, zero if variable.
    pub fn block_size(&self) -> u32 {
        self.media_params.block_size
    }

    pub fn part(&self, index: u32) -> Option<&PartitionState> {
        self.partitions.get(index as usize)
    }

    pub fn part_mut(&mut self, index: u32) -> Option<&mut PartitionState> {
        self.partitions.get_mut(index as usize)
    }

    /// The active partition.
    ///
    /// The active index is never allowed to leave the table, so this cannot
    /// fail.
    pub fn active(&self) -> &PartitionState {
        &self.partitions[self.partition as usize % MAX_PARTITIONS]
    }

    pub fn active_mut(&mut self) -> &mut PartitionState {
        &mut self.partitions[self.partition as usize % MAX_PARTITIONS]
    }

    /// Number of device blocks a transfer of `bytes` covered.
    ///
    /// Variable-block transfers always move exactly one block.
    pub fn blocks_for(&self, bytes: usize) -> u64 {
        if bytes == 0 {
            return 0;
        }

        match self.block_size() {
            0 => 1,
            size => (bytes as u64 + size as u64 - 1) / size as u64
        }
    }

    /// Account for a data transfer of `bytes` on the active partition.
    pub fn account_transfer(&mut self, bytes: usize) {
        let blocks = self.blocks_for(bytes);

        if blocks > 0 {
            self.advance_block(blocks as i64);
            self.active_mut().advance_blocks(blocks as i64);
        }
    }

    /// Move the absolute block counter.
    pub fn advance_block(&mut self, count: i64) {
        self.block = offset(self.block, count);
    }

    /// Re-establish the partition at `index`, if it is one we track.
    pub fn reset_partition(&mut self, index: u32, block: Option<u64>) {
        if let Some(part) = self.part_mut(index) {
            part.initialize(block);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DriveState, DriveOptions, LockState, PendingWrite, DriveFeatures, MAX_PARTITIONS};
    use crate::tape::partition::Boundary;

    #[test]
    fn new_drive_is_unknown() {
        let drive = DriveState::new(0, DriveOptions::default());

        assert_eq!(drive.partition, 0);
        assert_eq!(drive.block, None);
        assert_eq!(drive.pending, PendingWrite::Clean);
        assert_eq!(drive.lock, LockState::Unlocked);
        assert!(drive.has_option(DriveOptions::BUFFER_WRITES));
        assert_eq!(drive.active().block, None);
        assert!(drive.part(MAX_PARTITIONS as u32).is_none());
    }

    #[test]
    fn hardware_bits_are_not_driver_options() {
        let drive = DriveState::new(0, DriveOptions::ECC | DriveOptions::TWO_FM);

        assert!(drive.has_option(DriveOptions::TWO_FM));
        assert!(!drive.has_option(DriveOptions::ECC));
    }

    #[test]
    fn initialize_keeps_options() {
        let mut drive = DriveState::new(3, DriveOptions::SYSV);

        drive.partition = 1;
        drive.block = Some(10);
        drive.lock = LockState::Locked;
        drive.part_mut(1).unwrap().boundary = Boundary::EndOfData;
        drive.initialize();

        assert_eq!(drive.partition, 0);
        assert_eq!(drive.block, None);
        assert_eq!(drive.lock, LockState::Unlocked);
        assert_eq!(drive.part(1).unwrap().boundary, Boundary::None);
        assert!(drive.has_option(DriveOptions::SYSV));
    }

    #[test]
    fn lock_ordering() {
        assert!(!LockState::Unlocked.is_held());
        assert!(!LockState::LockError.is_held());
        assert!(LockState::AutoLocked.is_held());
        assert!(LockState::Locked.is_held());
    }

    #[test]
    fn transfer_accounting_fixed_blocks() {
        let mut drive = DriveState::new(0, DriveOptions::default());

        drive.media_params.block_size = 512;
        drive.block = Some(0);
        drive.reset_partition(0, Some(0));
        drive.account_transfer(1025);

        assert_eq!(drive.block, Some(3));
        assert_eq!(drive.active().block, Some(3));
        assert_eq!(drive.active().fblock, Some(3));
    }

    #[test]
    fn transfer_accounting_variable_blocks() {
        let mut drive = DriveState::new(0, DriveOptions::default());

        drive.block = Some(7);
        drive.reset_partition(0, Some(7));
        drive.account_transfer(65536);
        drive.account_transfer(0);

        assert_eq!(drive.block, Some(8));
        assert_eq!(drive.active().block, Some(8));
        assert_eq!(drive.active().fblock, None);
    }

    #[test]
    fn feature_words() {
        let features = DriveFeatures::VARIABLE_BLOCK | DriveFeatures::SET_BLOCK_SIZE;

        assert_eq!(features.low_word(), 0x0000_0800);
        assert_eq!(features.high_word(), 0x0000_0010);
    }
}
