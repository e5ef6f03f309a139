//! The narrow set of primitives a tape unit exposes to us.
//!
//! Everything in here is deliberately close to what the platform tape APIs
//! hand back: structural events such as filemarks and the end of data are
//! reported as status codes, not as data. Interpreting those codes is the job
//! of `DriveController`, and nowhere else.

use std::fmt;
use crate::result::PartialResult;
use crate::tape::drive::{DriveParameters, MediaParameters};

/// A raw status code reported by a transport primitive.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum TransportStatus {
    /// The medium was changed (or the transport thinks so). The operation
    /// may or may not have executed.
    MediaChanged,
    BusReset,
    FilemarkDetected,
    SetmarkDetected,
    /// End of recorded data.
    NoDataDetected,
    /// Early-warning end of medium.
    EndOfMedia,
    /// Physical end of medium; nothing more fits.
    EomOverflow,
    BeginningOfMedia,
    /// The supplied buffer could not hold the next variable-size block.
    MoreData,
    NoMedia,
    InvalidParameter,
    InvalidFunction,
    IoDevice,
    NotReady,
    /// An overlapped transfer was started and has not completed yet.
    IoPending,
    DeviceRequiresCleaning,
    InvalidBlockLength,
    NotEnoughMemory,
    WriteProtect,
    Other(u32)
}

impl TransportStatus {
    /// Filemarks and setmarks.
    pub fn is_mark(self) -> bool {
        self == TransportStatus::FilemarkDetected || self == TransportStatus::SetmarkDetected
    }

    pub fn is_setmark(self) -> bool {
        self == TransportStatus::SetmarkDetected
    }

    /// Any condition meaning "no more data this way": end of data or either
    /// flavor of end of medium.
    pub fn is_end_of_data(self) -> bool {
        match self {
            TransportStatus::EndOfMedia | TransportStatus::EomOverflow | TransportStatus::NoDataDetected => true,
            _ => false
        }
    }

    pub fn is_end_of_medium(self) -> bool {
        self == TransportStatus::EndOfMedia || self == TransportStatus::EomOverflow
    }

    pub fn is_beginning_of_medium(self) -> bool {
        self == TransportStatus::BeginningOfMedia
    }
}

impl fmt::Display for TransportStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TransportStatus::MediaChanged => write!(f, "media changed"),
            TransportStatus::BusReset => write!(f, "bus reset"),
            TransportStatus::FilemarkDetected => write!(f, "filemark detected"),
            TransportStatus::SetmarkDetected => write!(f, "setmark detected"),
            TransportStatus::NoDataDetected => write!(f, "no data detected"),
            TransportStatus::EndOfMedia => write!(f, "end of media"),
            TransportStatus::EomOverflow => write!(f, "end of media overflow"),
            TransportStatus::BeginningOfMedia => write!(f, "beginning of media"),
            TransportStatus::MoreData => write!(f, "more data is available"),
            TransportStatus::NoMedia => write!(f, "no media in drive"),
            TransportStatus::InvalidParameter => write!(f, "invalid parameter"),
            TransportStatus::InvalidFunction => write!(f, "invalid function"),
            TransportStatus::IoDevice => write!(f, "I/O device error"),
            TransportStatus::NotReady => write!(f, "device not ready"),
            TransportStatus::IoPending => write!(f, "I/O pending"),
            TransportStatus::DeviceRequiresCleaning => write!(f, "device requires cleaning"),
            TransportStatus::InvalidBlockLength => write!(f, "invalid block length"),
            TransportStatus::NotEnoughMemory => write!(f, "not enough memory"),
            TransportStatus::WriteProtect => write!(f, "medium is write protected"),
            TransportStatus::Other(code) => write!(f, "transport status {}", code)
        }
    }
}

/// Outcome of a primitive which only reports status.
pub type Status = Result<(), TransportStatus>;

/// Outcome of a data transfer: bytes moved, and possibly a status alongside.
///
/// `Failure(IoPending)` means the transfer was queued; its real outcome
/// comes from `TransportBackend::wait_async`.
pub type Transfer = PartialResult<usize, TransportStatus>;

/// Which position to report.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PositionQuery {
    Logical,
    Absolute
}

/// A position as reported by the transport.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct TapePosition {
    /// Zero-based partition, or `None` if the transport does not say.
    pub partition: Option<u32>,
    pub block: u64
}

/// How to move the medium.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PositionMethod {
    Rewind,
    AbsoluteBlock,
    LogicalBlock,
    EndOfData,
    RelativeBlocks,
    Filemarks,
    Setmarks
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum MarkKind {
    Setmarks,
    Filemarks,
    ShortFilemarks,
    LongFilemarks
}

impl MarkKind {
    pub fn is_setmark(self) -> bool {
        self == MarkKind::Setmarks
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum EraseKind {
    Short,
    Long
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PrepareAction {
    Load,
    Unload,
    Tension,
    Lock,
    Unlock,
    Format
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PartitionMethod {
    Fixed,
    Select,
    Initiator
}

/// The settable subset of drive parameters.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct DriveSettings {
    pub ecc: bool,
    pub compression: bool,
    pub data_padding: bool,
    pub report_setmarks: bool,
    pub eot_warning_zone_size: u32
}

/// One kind of medium the unit knows about.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct MediaTypeInfo {
    pub media_type: u32,
    /// Set on the entry describing the medium currently in the drive.
    pub mounted: bool,
    /// SCSI density code, if the unit is on a SCSI bus.
    pub density: Option<u8>
}

/// The primitives of a tape unit.
///
/// Implementations report conditions exactly as the unit does; they must not
/// try to interpret or hide any of them (including `MediaChanged`, which the
/// controller retries).
pub trait TransportBackend {
    fn get_position(&mut self, query: PositionQuery) -> Result<TapePosition, TransportStatus>;

    /// Move the medium.
    ///
    /// `partition` is only meaningful for the block addressing methods and
    /// selects the partition to switch to; `None` stays in the current one.
    /// `count` is signed for the spacing methods.
    fn set_position(&mut self, method: PositionMethod, partition: Option<u32>, count: i64, immediate: bool) -> Status;

    /// Read at most one transfer worth of blocks into `buf`.
    fn read(&mut self, buf: &mut [u8]) -> Transfer;

    fn write(&mut self, buf: &[u8]) -> Transfer;

    /// Block until the outstanding overlapped transfer completes.
    fn wait_async(&mut self) -> Transfer;

    fn write_marks(&mut self, kind: MarkKind, count: u32, immediate: bool) -> Status;

    fn erase(&mut self, kind: EraseKind, immediate: bool) -> Status;

    /// Format the medium into `count` partitions; `size` is the size of the
    /// second partition for methods which take one.
    fn create_partition(&mut self, method: PartitionMethod, count: u32, size: u32) -> Status;

    fn prepare(&mut self, action: PrepareAction, immediate: bool) -> Status;

    fn get_drive_parameters(&mut self) -> Result<DriveParameters, TransportStatus>;

    fn get_media_parameters(&mut self) -> Result<MediaParameters, TransportStatus>;

    fn set_drive_parameters(&mut self, settings: &DriveSettings) -> Status;

    fn set_media_parameters(&mut self, block_size: u32) -> Status;

    /// Report whether the unit is ready. Used to detect a missing medium and
    /// cleaning requests.
    fn get_device_status(&mut self) -> Status;

    /// List the kinds of medium the unit supports. Transports which cannot
    /// find out report none.
    fn media_types(&mut self) -> Result<Vec<MediaTypeInfo>, TransportStatus> {
        Ok(Vec::new())
    }
}

impl<T: TransportBackend + ?Sized> TransportBackend for Box<T> {
    fn get_position(&mut self, query: PositionQuery) -> Result<TapePosition, TransportStatus> {
        (**self).get_position(query)
    }

    fn set_position(&mut self, method: PositionMethod, partition: Option<u32>, count: i64, immediate: bool) -> Status {
        (**self).set_position(method, partition, count, immediate)
    }

    fn read(&mut self, buf: &mut [u8]) -> Transfer {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> Transfer {
        (**self).write(buf)
    }

    fn wait_async(&mut self) -> Transfer {
        (**self).wait_async()
    }

    fn write_marks(&mut self, kind: MarkKind, count: u32, immediate: bool) -> Status {
        (**self).write_marks(kind, count, immediate)
    }

    fn erase(&mut self, kind: EraseKind, immediate: bool) -> Status {
        (**self).erase(kind, immediate)
    }

    fn create_partition(&mut self, method: PartitionMethod, count: u32, size: u32) -> Status {
        (**self).create_partition(method, count, size)
    }

    fn prepare(&mut self, action: PrepareAction, immediate: bool) -> Status {
        (**self).prepare(action, immediate)
    }

    fn get_drive_parameters(&mut self) -> Result<DriveParameters, TransportStatus> {
        (**self).get_drive_parameters()
    }

    fn get_media_parameters(&mut self) -> Result<MediaParameters, TransportStatus> {
        (**self).get_media_parameters()
    }

    fn set_drive_parameters(&mut self, settings: &DriveSettings) -> Status {
        (**self).set_drive_parameters(settings)
    }

    fn set_media_parameters(&mut self, block_size: u32) -> Status {
        (**self).set_media_parameters(block_size)
    }

    fn get_device_status(&mut self) -> Status {
        (**self).get_device_status()
    }

    fn media_types(&mut self) -> Result<Vec<MediaTypeInfo>, TransportStatus> {
        (**self).media_types()
    }
}
