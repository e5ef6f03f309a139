//! An in-memory tape unit.
//!
//! Each partition is a list of records; one record is one block on the
//! medium, so a record's index is its block number. Writing anywhere
//! discards everything after the write position, like a real tape.
//!
//! Statuses can be queued up against individual primitives to simulate
//! media changes, bus resets and the like, and every primitive call is
//! logged so callers can check which ones were made.

use std::collections::VecDeque;
use crate::result::PartialResult::{Complete, Partial, Failure};
use crate::tape::drive::{DriveParameters, MediaParameters, DriveFeatures};
use crate::tape::transport::{TransportBackend, TransportStatus, Status, Transfer, PositionQuery, TapePosition, PositionMethod, MarkKind, EraseKind, PrepareAction, PartitionMethod, DriveSettings, MediaTypeInfo};

/// One block on the emulated medium.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Record {
    Data(Vec<u8>),
    Filemark,
    Setmark
}

impl Record {
    fn mark_status(&self) -> Option<TransportStatus> {
        match self {
            Record::Data(_) => None,
            Record::Filemark => Some(TransportStatus::FilemarkDetected),
            Record::Setmark => Some(TransportStatus::SetmarkDetected)
        }
    }
}

/// The transport primitives, for the call log and status injection.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum Primitive {
    GetPosition,
    SetPosition,
    Read,
    Write,
    WaitAsync,
    WriteMarks,
    Erase,
    CreatePartition,
    Prepare,
    GetDriveParameters,
    GetMediaParameters,
    SetDriveParameters,
    SetMediaParameters,
    GetDeviceStatus,
    MediaTypes
}

/// Media type reported for the emulated cartridge (DDS-4).
const EMULATED_MEDIA_TYPE : u32 = 0x20;
const EMULATED_DENSITY : u8 = 0x26;

pub struct EmulatedTape {
    partitions: Vec<Vec<Record>>,
    partition: usize,
    position: usize,
    block_size: u32,
    drive_params: DriveParameters,
    medium: bool,
    write_protected: bool,
    needs_cleaning: bool,
    locked: bool,
    logical_positions: bool,
    /// Records the medium holds, and how many of those form the early
    /// warning zone at its end.
    capacity: Option<(usize, usize)>,
    async_writes: bool,
    outstanding: Option<Transfer>,
    injected: VecDeque<(Primitive, TransportStatus)>,
    calls: Vec<Primitive>
}

impl EmulatedTape {
    /// A drive with a blank, single-partition medium loaded, in variable
    /// block mode.
    pub fn new() -> EmulatedTape {
        EmulatedTape {
            partitions: vec![Vec::new()],
            partition: 0,
            position: 0,
            block_size: 0,
            drive_params: DriveParameters {
                ecc: true,
                compression: false,
                data_padding: false,
                report_setmarks: true,
                default_block_size: 512,
                maximum_block_size: 1024 * 1024,
                minimum_block_size: 1,
                maximum_partition_count: 4,
                features: EmulatedTape::default_features(),
                eot_warning_zone_size: 0
            },
            medium: true,
            write_protected: false,
            needs_cleaning: false,
            locked: false,
            logical_positions: true,
            capacity: None,
            async_writes: false,
            outstanding: None,
            injected: VecDeque::new(),
            calls: Vec::new()
        }
    }

    /// Everything a well-behaved modern drive advertises.
    pub fn default_features() -> DriveFeatures {
        DriveFeatures::FIXED | DriveFeatures::INITIATOR | DriveFeatures::ERASE_SHORT
            | DriveFeatures::ERASE_LONG | DriveFeatures::TAPE_CAPACITY | DriveFeatures::TAPE_REMAINING
            | DriveFeatures::FIXED_BLOCK | DriveFeatures::VARIABLE_BLOCK | DriveFeatures::WRITE_PROTECT
            | DriveFeatures::ECC | DriveFeatures::COMPRESSION | DriveFeatures::PADDING
            | DriveFeatures::REPORT_SMKS | DriveFeatures::GET_ABSOLUTE_BLK | DriveFeatures::GET_LOGICAL_BLK
            | DriveFeatures::SET_EOT_WZ_SIZE | DriveFeatures::LOAD_UNLOAD | DriveFeatures::TENSION
            | DriveFeatures::LOCK_UNLOCK | DriveFeatures::SET_BLOCK_SIZE | DriveFeatures::SET_ECC
            | DriveFeatures::SET_COMPRESSION | DriveFeatures::SET_PADDING | DriveFeatures::SET_REPORT_SMKS
            | DriveFeatures::ABSOLUTE_BLK | DriveFeatures::LOGICAL_BLK | DriveFeatures::END_OF_DATA
            | DriveFeatures::RELATIVE_BLKS | DriveFeatures::FILEMARKS | DriveFeatures::SETMARKS
            | DriveFeatures::WRITE_SETMARKS | DriveFeatures::WRITE_FILEMARKS | DriveFeatures::FORMAT
    }

    pub fn with_block_size(mut self, block_size: u32) -> EmulatedTape {
        self.block_size = block_size;
        self
    }

    pub fn with_features(mut self, features: DriveFeatures) -> EmulatedTape {
        self.drive_params.features = features;
        self
    }

    pub fn with_partition_limit(mut self, count: u32) -> EmulatedTape {
        self.drive_params.maximum_partition_count = count;
        self
    }

    /// Limit the medium to `records` blocks, warning about the end of the
    /// medium for the last `warning` of them.
    pub fn with_capacity(mut self, records: usize, warning: usize) -> EmulatedTape {
        self.capacity = Some((records, warning));
        self
    }

    /// Queue every write and only report its outcome from `wait_async`.
    pub fn with_async_writes(mut self) -> EmulatedTape {
        self.async_writes = true;
        self
    }

    /// Refuse logical position queries, like drives that only know absolute
    /// block numbers.
    pub fn without_logical_positions(mut self) -> EmulatedTape {
        self.logical_positions = false;
        self
    }

    pub fn eject(&mut self) {
        self.medium = false;
        self.position = 0;
    }

    /// Load a fresh blank medium.
    pub fn insert(&mut self) {
        self.partitions = vec![Vec::new()];
        self.partition = 0;
        self.position = 0;
        self.medium = true;
    }

    pub fn set_write_protected(&mut self, protected: bool) {
        self.write_protected = protected;
    }

    pub fn set_needs_cleaning(&mut self, needs_cleaning: bool) {
        self.needs_cleaning = needs_cleaning;
    }

    /// Have the next call of `primitive` fail with `status` without doing
    /// anything.
    pub fn inject(&mut self, primitive: Primitive, status: TransportStatus) {
        self.injected.push_back((primitive, status));
    }

    pub fn calls(&self) -> &[Primitive] {
        &self.calls
    }

    pub fn count_calls(&self, primitive: Primitive) -> usize {
        self.calls.iter().filter(|call| **call == primitive).count()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn records(&self, partition: usize) -> &[Record] {
        self.partitions.get(partition).map(|p| p.as_slice()).unwrap_or(&[])
    }

    /// Current partition and block.
    pub fn position(&self) -> (usize, usize) {
        (self.partition, self.position)
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    fn enter(&mut self, primitive: Primitive) -> Result<(), TransportStatus> {
        self.calls.push(primitive);

        match self.injected.iter().position(|(p, _)| *p == primitive) {
            Some(index) => match self.injected.remove(index) {
                Some((_, status)) => Err(status),
                None => Ok(())
            },
            None => Ok(())
        }
    }

    fn loaded(&self) -> Status {
        if self.medium { Ok(()) } else { Err(TransportStatus::NoMedia) }
    }

    fn current(&self) -> &Vec<Record> {
        &self.partitions[self.partition]
    }

    fn current_mut(&mut self) -> &mut Vec<Record> {
        &mut self.partitions[self.partition]
    }

    /// Space over `count` marks; `setmarks_only` skips filemarks instead of
    /// counting them.
    fn space_marks(&mut self, count: i64, setmarks_only: bool) -> Status {
        let len = self.current().len();
        let counts = |record: &Record| match record {
            Record::Setmark => true,
            Record::Filemark => !setmarks_only,
            Record::Data(_) => false
        };

        if count > 0 {
            for _ in 0..count {
                loop {
                    if self.position >= len {
                        return Err(TransportStatus::NoDataDetected);
                    }

                    let record = &self.partitions[self.partition][self.position];
                    self.position += 1;

                    if counts(record) {
                        //Filemark spacing stops early at a setmark.
                        if !setmarks_only && *record == Record::Setmark {
                            return Err(TransportStatus::SetmarkDetected);
                        }

                        break;
                    }
                }
            }
        } else {
            for _ in count..0 {
                loop {
                    if self.position == 0 {
                        return Err(TransportStatus::BeginningOfMedia);
                    }

                    self.position -= 1;

                    if counts(&self.partitions[self.partition][self.position]) {
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    fn space_blocks(&mut self, count: i64) -> Status {
        let len = self.current().len();

        if count > 0 {
            for _ in 0..count {
                if self.position >= len {
                    return Err(TransportStatus::NoDataDetected);
                }

                self.position += 1;

                if let Some(mark) = self.partitions[self.partition][self.position - 1].mark_status() {
                    return Err(mark);
                }
            }
        } else {
            for _ in count..0 {
                if self.position == 0 {
                    return Err(TransportStatus::BeginningOfMedia);
                }

                self.position -= 1;

                if let Some(mark) = self.partitions[self.partition][self.position].mark_status() {
                    return Err(mark);
                }
            }
        }

        Ok(())
    }

    /// Append records at the current position, checking capacity.
    fn append(&mut self, records: Vec<Record>) -> Status {
        let position = self.position;
        let added = records.len();

        if let Some((capacity, _)) = self.capacity {
            if position + added > capacity {
                return Err(TransportStatus::EomOverflow);
            }
        }

        let part = self.current_mut();
        part.truncate(position);
        part.extend(records);
        self.position = position + added;

        match self.capacity {
            Some((capacity, warning)) if self.position > capacity.saturating_sub(warning) => Err(TransportStatus::EndOfMedia),
            _ => Ok(())
        }
    }

    fn do_write(&mut self, buf: &[u8]) -> Transfer {
        if let Err(err) = self.loaded() {
            return Failure(err);
        }

        if self.write_protected {
            return Failure(TransportStatus::WriteProtect);
        }

        let records = match self.block_size as usize {
            0 => vec![Record::Data(buf.to_vec())],
            size if buf.len() % size == 0 => buf.chunks(size).map(|chunk| Record::Data(chunk.to_vec())).collect(),
            _ => return Failure(TransportStatus::InvalidBlockLength)
        };

        match self.append(records) {
            Ok(()) => Complete(buf.len()),
            Err(TransportStatus::EndOfMedia) => Partial(buf.len(), TransportStatus::EndOfMedia),
            Err(err) => Failure(err)
        }
    }

    fn read_variable(&mut self, buf: &mut [u8]) -> Transfer {
        let record = match self.current().get(self.position) {
            Some(record) => record.clone(),
            None => return Failure(TransportStatus::NoDataDetected)
        };

        self.position += 1;

        match record {
            Record::Data(data) => {
                if data.len() > buf.len() {
                    let len = buf.len();
                    buf.copy_from_slice(&data[..len]);

                    Partial(len, TransportStatus::MoreData)
                } else {
                    buf[..data.len()].copy_from_slice(&data);

                    Complete(data.len())
                }
            },
            mark => Failure(mark.mark_status().unwrap_or(TransportStatus::FilemarkDetected))
        }
    }

    fn read_fixed(&mut self, buf: &mut [u8]) -> Transfer {
        let size = self.block_size as usize;

        if buf.len() < size {
            return Failure(TransportStatus::InvalidBlockLength);
        }

        let mut filled = 0;

        while filled + size <= buf.len() {
            let record = match self.current().get(self.position) {
                Some(record) => record.clone(),
                None => return Failure(TransportStatus::NoDataDetected).or_partial(filled)
            };

            self.position += 1;

            match record {
                Record::Data(data) => {
                    let len = data.len().min(size);
                    buf[filled..filled + len].copy_from_slice(&data[..len]);
                    filled += size;
                },
                mark => return Failure(mark.mark_status().unwrap_or(TransportStatus::FilemarkDetected)).or_partial(filled)
            }
        }

        Complete(filled)
    }
}

trait OrPartial {
    fn or_partial(self, bytes: usize) -> Self;
}

impl OrPartial for Transfer {
    /// Attach the bytes already moved to a failure, if there were any.
    fn or_partial(self, bytes: usize) -> Transfer {
        match self {
            Failure(err) if bytes > 0 => Partial(bytes, err),
            other => other
        }
    }
}

impl Default for EmulatedTape {
    fn default() -> Self {
        EmulatedTape::new()
    }
}

impl TransportBackend for EmulatedTape {
    fn get_position(&mut self, query: PositionQuery) -> Result<TapePosition, TransportStatus> {
        self.enter(Primitive::GetPosition)?;
        self.loaded()?;

        match query {
            PositionQuery::Logical if !self.logical_positions => Err(TransportStatus::InvalidFunction),
            PositionQuery::Logical => Ok(TapePosition { partition: Some(self.partition as u32), block: self.position as u64 }),
            PositionQuery::Absolute => Ok(TapePosition { partition: None, block: self.position as u64 })
        }
    }

    fn set_position(&mut self, method: PositionMethod, partition: Option<u32>, count: i64, _immediate: bool) -> Status {
        self.enter(Primitive::SetPosition)?;
        self.loaded()?;

        match method {
            PositionMethod::Rewind => {
                self.position = 0;
                Ok(())
            },
            PositionMethod::AbsoluteBlock | PositionMethod::LogicalBlock => {
                if let Some(partition) = partition {
                    if partition as usize >= self.partitions.len() {
                        return Err(TransportStatus::InvalidParameter);
                    }

                    self.partition = partition as usize;
                }

                let len = self.current().len();
                if count < 0 {
                    return Err(TransportStatus::InvalidParameter);
                } else if count as usize > len {
                    self.position = len;
                    return Err(TransportStatus::NoDataDetected);
                }

                self.position = count as usize;
                Ok(())
            },
            PositionMethod::EndOfData => {
                self.position = self.current().len();
                Ok(())
            },
            PositionMethod::RelativeBlocks => self.space_blocks(count),
            PositionMethod::Filemarks => self.space_marks(count, false),
            PositionMethod::Setmarks => self.space_marks(count, true)
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Transfer {
        if let Err(err) = self.enter(Primitive::Read).and(self.loaded()) {
            return Failure(err);
        }

        if self.block_size == 0 {
            self.read_variable(buf)
        } else {
            self.read_fixed(buf)
        }
    }

    fn write(&mut self, buf: &[u8]) -> Transfer {
        if let Err(err) = self.enter(Primitive::Write) {
            return Failure(err);
        }

        let res = self.do_write(buf);

        if self.async_writes {
            self.outstanding = Some(res);
            return Failure(TransportStatus::IoPending);
        }

        res
    }

    fn wait_async(&mut self) -> Transfer {
        if let Err(err) = self.enter(Primitive::WaitAsync) {
            return Failure(err);
        }

        self.outstanding.take().unwrap_or(Complete(0))
    }

    fn write_marks(&mut self, kind: MarkKind, count: u32, _immediate: bool) -> Status {
        self.enter(Primitive::WriteMarks)?;
        self.loaded()?;

        if self.write_protected {
            return Err(TransportStatus::WriteProtect);
        }

        let record = if kind.is_setmark() { Record::Setmark } else { Record::Filemark };

        match self.append(vec![record; count as usize]) {
            Err(TransportStatus::EndOfMedia) => Ok(()),
            res => res
        }
    }

    fn erase(&mut self, _kind: EraseKind, _immediate: bool) -> Status {
        self.enter(Primitive::Erase)?;
        self.loaded()?;

        if self.write_protected {
            return Err(TransportStatus::WriteProtect);
        }

        let position = self.position;
        self.current_mut().truncate(position);
        self.position = 0;

        Ok(())
    }

    fn create_partition(&mut self, _method: PartitionMethod, count: u32, _size: u32) -> Status {
        self.enter(Primitive::CreatePartition)?;
        self.loaded()?;

        if count == 0 || count > self.drive_params.maximum_partition_count {
            return Err(TransportStatus::InvalidParameter);
        }

        self.partitions = vec![Vec::new(); count as usize];
        self.partition = 0;
        self.position = 0;

        Ok(())
    }

    fn prepare(&mut self, action: PrepareAction, _immediate: bool) -> Status {
        self.enter(Primitive::Prepare)?;

        match action {
            PrepareAction::Load => {
                self.loaded()?;
                self.position = 0;
            },
            PrepareAction::Unload => {
                self.loaded()?;
                self.eject();
            },
            PrepareAction::Tension => {
                self.loaded()?;
                self.position = 0;
            },
            PrepareAction::Lock => self.locked = true,
            PrepareAction::Unlock => self.locked = false,
            PrepareAction::Format => {
                self.loaded()?;
                self.partitions = vec![Vec::new()];
                self.partition = 0;
                self.position = 0;
            }
        }

        Ok(())
    }

    fn get_drive_parameters(&mut self) -> Result<DriveParameters, TransportStatus> {
        self.enter(Primitive::GetDriveParameters)?;

        Ok(self.drive_params)
    }

    fn get_media_parameters(&mut self) -> Result<MediaParameters, TransportStatus> {
        self.enter(Primitive::GetMediaParameters)?;
        self.loaded()?;

        let used = self.current().len();
        let (capacity, remaining) = match self.capacity {
            Some((capacity, _)) => (capacity as u64, capacity.saturating_sub(used) as u64),
            None => (0, 0)
        };

        Ok(MediaParameters {
            capacity: capacity,
            remaining: remaining,
            block_size: self.block_size,
            partition_count: self.partitions.len() as u32,
            write_protected: self.write_protected
        })
    }

    fn set_drive_parameters(&mut self, settings: &DriveSettings) -> Status {
        self.enter(Primitive::SetDriveParameters)?;

        self.drive_params.ecc = settings.ecc;
        self.drive_params.compression = settings.compression;
        self.drive_params.data_padding = settings.data_padding;
        self.drive_params.report_setmarks = settings.report_setmarks;
        self.drive_params.eot_warning_zone_size = settings.eot_warning_zone_size;

        Ok(())
    }

    fn set_media_parameters(&mut self, block_size: u32) -> Status {
        self.enter(Primitive::SetMediaParameters)?;
        self.loaded()?;

        self.block_size = block_size;
        Ok(())
    }

    fn get_device_status(&mut self) -> Status {
        self.enter(Primitive::GetDeviceStatus)?;
        self.loaded()?;

        if self.needs_cleaning {
            return Err(TransportStatus::DeviceRequiresCleaning);
        }

        Ok(())
    }

    fn media_types(&mut self) -> Result<Vec<MediaTypeInfo>, TransportStatus> {
        self.enter(Primitive::MediaTypes)?;

        Ok(vec![MediaTypeInfo {
            media_type: EMULATED_MEDIA_TYPE,
            mounted: self.medium,
            density: Some(EMULATED_DENSITY)
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::{EmulatedTape, Record, Primitive};
    use crate::result::PartialResult::{Complete, Partial, Failure};
    use crate::tape::transport::{TransportBackend, TransportStatus, PositionMethod, PositionQuery, MarkKind};

    #[test]
    fn write_truncates_the_tail() {
        let mut tape = EmulatedTape::new();

        assert_eq!(tape.write(b"one"), Complete(3));
        assert_eq!(tape.write(b"two"), Complete(3));
        assert_eq!(tape.set_position(PositionMethod::Rewind, None, 0, false), Ok(()));
        assert_eq!(tape.write(b"three"), Complete(5));

        assert_eq!(tape.records(0), &[Record::Data(b"three".to_vec())]);
    }

    #[test]
    fn fixed_read_stops_at_filemark() {
        let mut tape = EmulatedTape::new().with_block_size(4);
        let mut buf = [0; 16];

        assert_eq!(tape.write(b"abcdefgh"), Complete(8));
        assert_eq!(tape.write_marks(MarkKind::Filemarks, 1, false), Ok(()));
        assert_eq!(tape.set_position(PositionMethod::Rewind, None, 0, false), Ok(()));

        assert_eq!(tape.read(&mut buf), Partial(8, TransportStatus::FilemarkDetected));
        assert_eq!(&buf[..8], b"abcdefgh");
        assert_eq!(tape.position(), (0, 3));
        assert_eq!(tape.read(&mut buf), Failure(TransportStatus::NoDataDetected));
    }

    #[test]
    fn short_buffer_reports_more_data() {
        let mut tape = EmulatedTape::new();
        let mut buf = [0; 2];

        assert_eq!(tape.write(b"abcd"), Complete(4));
        assert_eq!(tape.set_position(PositionMethod::Rewind, None, 0, false), Ok(()));
        assert_eq!(tape.read(&mut buf), Partial(2, TransportStatus::MoreData));
    }

    #[test]
    fn filemark_spacing_stops_at_setmark() {
        let mut tape = EmulatedTape::new();

        assert_eq!(tape.write_marks(MarkKind::Setmarks, 1, false), Ok(()));
        assert_eq!(tape.write_marks(MarkKind::Filemarks, 1, false), Ok(()));
        assert_eq!(tape.set_position(PositionMethod::Rewind, None, 0, false), Ok(()));

        assert_eq!(tape.set_position(PositionMethod::Filemarks, None, 2, false), Err(TransportStatus::SetmarkDetected));
        assert_eq!(tape.position(), (0, 1));
    }

    #[test]
    fn backward_spacing_hits_beginning() {
        let mut tape = EmulatedTape::new();

        assert_eq!(tape.write(b"x"), Complete(1));
        assert_eq!(tape.set_position(PositionMethod::RelativeBlocks, None, -2, false), Err(TransportStatus::BeginningOfMedia));
        assert_eq!(tape.position(), (0, 0));
    }

    #[test]
    fn capacity_warns_then_overflows() {
        let mut tape = EmulatedTape::new().with_capacity(3, 1);

        assert_eq!(tape.write(b"a"), Complete(1));
        assert_eq!(tape.write(b"b"), Complete(1));
        assert_eq!(tape.write(b"c"), Partial(1, TransportStatus::EndOfMedia));
        assert_eq!(tape.write(b"d"), Failure(TransportStatus::EomOverflow));
    }

    #[test]
    fn injected_status_is_one_shot() {
        let mut tape = EmulatedTape::new().without_logical_positions();

        tape.inject(Primitive::GetPosition, TransportStatus::MediaChanged);

        assert_eq!(tape.get_position(PositionQuery::Absolute), Err(TransportStatus::MediaChanged));
        assert_eq!(tape.get_position(PositionQuery::Logical), Err(TransportStatus::InvalidFunction));
        assert_eq!(tape.get_position(PositionQuery::Absolute).map(|p| p.block), Ok(0));
        assert_eq!(tape.count_calls(Primitive::GetPosition), 3);
    }

    #[test]
    fn async_write_resolves_later() {
        let mut tape = EmulatedTape::new().with_async_writes();

        assert_eq!(tape.write(b"data"), Failure(TransportStatus::IoPending));
        assert_eq!(tape.wait_async(), Complete(4));
        assert_eq!(tape.wait_async(), Complete(0));
    }
}
