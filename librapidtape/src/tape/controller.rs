//! The operation set that keeps a `DriveState` honest.
//!
//! Every operation here talks to the transport, then decides for each
//! position counter whether it can be computed exactly, must become unknown,
//! or has to be re-queried. The raw status codes the transport reports are
//! interpreted here (and in `position`) and nowhere else.

use log::{debug, trace};
use crate::error::TapeError;
use crate::result::PartialResult;
use crate::result::PartialResult::{Complete, Partial, Failure};
use crate::tape::command::OptionsRequest;
use crate::tape::drive::{DriveState, DriveOptions, DriveFeatures, PendingWrite, LockState, MAX_PARTITIONS};
use crate::tape::partition::{Boundary, offset};
use crate::tape::transport::{TransportBackend, TransportStatus, Status, Transfer, PositionMethod, MarkKind, EraseKind, PrepareAction, PartitionMethod, DriveSettings};

/// Anything a transport primitive can hand back, as far as the media-change
/// retry is concerned.
pub trait Outcome {
    fn media_changed(&self) -> bool;
}

impl<R> Outcome for Result<R, TransportStatus> {
    fn media_changed(&self) -> bool {
        match self {
            Err(TransportStatus::MediaChanged) => true,
            _ => false
        }
    }
}

impl Outcome for Transfer {
    fn media_changed(&self) -> bool {
        self.err_ref() == Some(&TransportStatus::MediaChanged)
    }
}

/// One unit's drive state together with the transport that reaches it, for
/// the duration of a single operation.
///
/// Callers are expected to hold the unit exclusively while a controller
/// exists; `TapeHandle` does this by keeping the unit's mutex locked.
pub struct DriveController<'a, T: TransportBackend + ?Sized> {
    pub(crate) drive: &'a mut DriveState,
    pub(crate) transport: &'a mut T
}

impl<'a, T: TransportBackend + ?Sized> DriveController<'a, T> {
    pub fn new(drive: &'a mut DriveState, transport: &'a mut T) -> DriveController<'a, T> {
        DriveController {
            drive: drive,
            transport: transport
        }
    }

    pub fn drive(&self) -> &DriveState {
        &*self.drive
    }

    /// Issue a transport primitive, transparently repeating it for as long as
    /// the transport claims the medium changed.
    ///
    /// Some transports report a media change once per call without having
    /// done anything, so every change notice resets what we know about the
    /// unit and the call is made again. Resetting changes the condition under
    /// test, so this does not spin.
    pub(crate) fn call<R: Outcome, F: FnMut(&mut T) -> R>(&mut self, mut op: F) -> R {
        loop {
            let res = op(&mut *self.transport);

            if !res.media_changed() {
                return res;
            }

            trace!("tape{}: media changed, reinitializing and retrying", self.drive.unit);
            self.media_changed();
        }
    }

    /// Reset state after a media change notice.
    fn media_changed(&mut self) {
        self.drive.initialize();
        self.refresh_parameters();

        let partition = self.drive.partition;
        self.drive.reset_partition(partition, Some(0));
    }

    /// Re-read the cached parameters without going through the retry, keeping
    /// whatever we had if the transport refuses.
    fn refresh_parameters(&mut self) {
        if let Ok(dp) = self.transport.get_drive_parameters() {
            self.drive.drive_params = dp;
        }

        if let Ok(mp) = self.transport.get_media_parameters() {
            self.drive.media_params = mp;
        }
    }

    /// Full reinitialization: all partitions forgotten, parameters re-queried.
    pub(crate) fn reinitialize(&mut self) {
        self.drive.initialize();

        let _ = self.get_dp();
        let _ = self.get_mp();
    }

    /// Record the outcome of an operation and translate it for the caller.
    pub(crate) fn finish(&mut self, res: Status) -> Result<(), TapeError> {
        if let Err(err) = res {
            trace!("tape{}: {}", self.drive.unit, err);
        }

        self.drive.last_error = res.err();
        res.map_err(TapeError::from)
    }

    pub(crate) fn no_medium(&mut self) -> bool {
        self.call(|t| t.get_device_status()) == Err(TransportStatus::NoMedia)
    }

    pub(crate) fn get_dp(&mut self) -> Status {
        let dp = self.call(|t| t.get_drive_parameters())?;

        self.drive.drive_params = dp;
        Ok(())
    }

    pub(crate) fn get_mp(&mut self) -> Status {
        let mp = self.call(|t| t.get_media_parameters())?;

        self.drive.media_params = mp;
        Ok(())
    }

    /// The drive settings we currently believe are in force.
    pub(crate) fn settings(&self) -> DriveSettings {
        let dp = &self.drive.drive_params;

        DriveSettings {
            ecc: dp.ecc,
            compression: dp.compression,
            data_padding: dp.data_padding,
            report_setmarks: dp.report_setmarks,
            eot_warning_zone_size: dp.eot_warning_zone_size
        }
    }

    /// Wait out an outstanding asynchronous write and account for what it
    /// transferred.
    pub(crate) fn resolve_pending_write(&mut self) -> Status {
        let res = self.transport.wait_async();
        let (bytes, status) = res.both();

        self.drive.pending = PendingWrite::HasWritten;
        self.drive.account_transfer(bytes.unwrap_or(0));

        match status {
            Some(TransportStatus::EomOverflow) => {
                self.drive.active_mut().boundary = Boundary::EndOfMedium;
                Err(TransportStatus::EomOverflow)
            },
            Some(err) => Err(err),
            None => Ok(())
        }
    }

    /// Resolve any outstanding asynchronous write whose status nobody is
    /// going to look at, and mark the unit clean.
    pub(crate) fn settle_pending_write(&mut self) {
        if self.drive.pending == PendingWrite::AsyncWritePending {
            let _ = self.resolve_pending_write();
        }

        self.drive.pending = PendingWrite::Clean;
    }

    /// Take the automatic lock if the driver is configured to and no lock is
    /// currently held.
    fn auto_lock(&mut self) {
        if self.drive.has_option(DriveOptions::AUTO_LOCK) && !self.drive.lock.is_held() {
            let _ = self.prepare_raw(PrepareAction::Lock, true);
        }
    }

    /// Ask where we are and reset only what disagrees with the answer.
    ///
    /// Used after a failed operation left us unsure of the position.
    pub(crate) fn reconcile_position(&mut self) {
        let saved_block = self.drive.block;
        let saved_partition = self.drive.partition;

        let _ = self.get_pos();

        let partition = self.drive.partition;
        let block = self.drive.block;

        if saved_partition != partition {
            let disagrees = self.drive.part(partition).map(|p| p.block != block).unwrap_or(false);

            if disagrees {
                self.drive.reset_partition(partition, block);
            }
        } else if saved_block != block {
            self.drive.reset_partition(partition, block);
        }
    }

    /// Bring the unit's state in line with the medium after it was opened.
    pub fn open(&mut self) -> Result<(), TapeError> {
        let params = self.get_dp().and(self.get_mp());
        let pos = self.get_pos();

        let partition = self.drive.partition;
        let block = self.drive.block;

        if let Some(part) = self.drive.part_mut(partition) {
            if part.block != block {
                part.initialize(block);
            }
        }

        //After a volume change some transports keep reporting "no data" on
        //every read until a position-setting call resets them, even at
        //block 0. Rewinding in place clears that.
        let mut res = params.and(pos);
        if block == Some(0) {
            debug!("tape{}: rewind in position 0", self.drive.unit);
            res = res.and(self.set_pos(PositionMethod::Rewind, 0, false));
        }

        self.finish(res)
    }

    /// Open, then position just before the next filemark so that new data
    /// lands at the end of the current file.
    pub fn open_for_append(&mut self) -> Result<(), TapeError> {
        self.open()?;

        let res = self.set_pos(PositionMethod::Filemarks, 1, true);
        self.finish(res)
    }

    /// Terminate whatever the handle was doing and optionally rewind.
    ///
    /// After writing, a filemark is written (two in `TWO_FM` mode, backing
    /// over the second one unless rewinding). After reading, the position is
    /// adjusted so that a filemark crossed but not yet reported is not lost.
    pub fn close(&mut self, rewind: bool) -> Result<(), TapeError> {
        let mut res = Ok(());

        if self.no_medium() {
            self.drive.pending = PendingWrite::Clean;
        }

        if self.drive.pending >= PendingWrite::HasWritten {
            if self.drive.pending == PendingWrite::AsyncWritePending {
                res = self.resolve_pending_write();
            }

            if res.is_ok() {
                let two_fm = self.drive.has_option(DriveOptions::TWO_FM);

                debug!("tape{}: writing filemark", self.drive.unit);
                res = self.write_marks_raw(MarkKind::Filemarks, if two_fm { 2 } else { 1 });

                if two_fm && res.is_ok() && !rewind {
                    res = self.set_pos(PositionMethod::Filemarks, -1, false);

                    if res.is_ok() {
                        self.drive.active_mut().fblock = Some(0);
                    }
                }
            }
        } else if self.drive.pending == PendingWrite::HasRead && !rewind {
            let boundary = self.drive.active().boundary;

            if self.drive.has_option(DriveOptions::SYSV) {
                if boundary == Boundary::None {
                    res = self.set_pos(PositionMethod::Filemarks, 1, false);
                } else if boundary == Boundary::FilemarkHit {
                    self.drive.active_mut().boundary = Boundary::Filemark;
                }
            } else if boundary == Boundary::FilemarkHit {
                res = self.set_pos(PositionMethod::Filemarks, -1, false);
            }
        }

        if rewind {
            debug!("tape{}: rewinding", self.drive.unit);
            res = res.and(self.set_pos(PositionMethod::Rewind, 0, false));
        }

        if self.drive.has_option(DriveOptions::AUTO_LOCK) && self.drive.lock == LockState::AutoLocked {
            res = res.and(self.prepare_raw(PrepareAction::Unlock, false));
        }

        self.drive.pending = PendingWrite::Clean;
        self.finish(res)
    }

    /// Read one transfer from the active partition.
    ///
    /// A filemark, end of data or end of medium is reported first as a
    /// successful short read; only once that has been consumed does the end
    /// of data or medium become an error.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, TapeError> {
        if self.no_medium() {
            return self.finish(Err(TransportStatus::NoMedia)).map(|_| 0);
        }

        if self.drive.last_error == Some(TransportStatus::BusReset) {
            return Err(TapeError::BusReset);
        }

        self.settle_pending_write();

        let boundary = self.drive.active().boundary;
        if boundary.is_hit() {
            self.drive.active_mut().boundary = boundary.settle();
            return self.finish(Ok(())).map(|_| 0);
        }

        match boundary {
            Boundary::EndOfData => return self.finish(Err(TransportStatus::NoDataDetected)).map(|_| 0),
            Boundary::EndOfMedium => return self.finish(Err(TransportStatus::EndOfMedia)).map(|_| 0),
            _ => {}
        }

        self.drive.active_mut().setmark = false;
        self.auto_lock();

        let res = match self.call(|t| t.read(buf)) {
            Failure(TransportStatus::IoPending) => self.transport.wait_async(),
            res => res
        };

        let (bytes, status) = res.both();
        let bytes = bytes.unwrap_or(0);

        self.drive.account_transfer(bytes);

        let status = match status {
            Some(mark) if mark.is_mark() => {
                self.drive.advance_block(1);

                let part = self.drive.active_mut();
                part.block = offset(part.block, 1);
                part.advance_files(1);
                part.fblock = Some(0);
                part.setmark = mark.is_setmark();
                part.boundary = if bytes > 0 { Boundary::FilemarkHit } else { Boundary::Filemark };

                None
            },
            Some(end) if end.is_end_of_data() => {
                let part = self.drive.active_mut();

                if part.boundary == Boundary::Filemark {
                    part.boundary = if end.is_end_of_medium() { Boundary::EndOfMedium } else { Boundary::EndOfData };
                    Some(end)
                } else {
                    part.boundary = if end.is_end_of_medium() { Boundary::EndOfMediumHit } else { Boundary::EndOfDataHit };
                    None
                }
            },
            other => {
                self.drive.active_mut().boundary = Boundary::None;

                //Variable block mode with a short buffer. Report it the way
                //other tape drivers do.
                other.map(|err| match err {
                    TransportStatus::MoreData => TransportStatus::NotEnoughMemory,
                    err => err
                })
            }
        };

        if status.is_none() {
            self.drive.pending = PendingWrite::HasRead;
        }

        self.finish(status.map_or(Ok(()), Err)).map(|_| bytes)
    }

    /// Write one transfer to the active partition.
    ///
    /// A `Partial` result carries bytes that reached the medium along with
    /// a warning, typically that the end of the medium is near. An
    /// asynchronous write that was queued reports the whole buffer as
    /// accepted; what it really transferred is accounted when it resolves.
    pub fn write(&mut self, buf: &[u8]) -> PartialResult<usize, TapeError> {
        if self.no_medium() {
            self.drive.last_error = Some(TransportStatus::NoMedia);
            return Failure(TapeError::NoMedium);
        }

        if self.drive.last_error == Some(TransportStatus::BusReset) {
            return Partial(0, TapeError::BusReset);
        }

        let mut async_err = None;
        if self.drive.pending == PendingWrite::AsyncWritePending {
            async_err = self.resolve_pending_write().err();
        }

        self.drive.pending = PendingWrite::Clean;
        self.drive.active_mut().setmark = false;
        self.auto_lock();

        let res = match self.call(|t| t.write(buf)) {
            Failure(TransportStatus::IoPending) => {
                if self.drive.has_option(DriveOptions::ASYNC_WRITES) && self.drive.block_size() == 0 {
                    self.drive.pending = PendingWrite::AsyncWritePending;

                    return match self.finish(async_err.map_or(Ok(()), Err)) {
                        Ok(()) => Complete(buf.len()),
                        Err(err) => Partial(buf.len(), err)
                    };
                }

                self.transport.wait_async()
            },
            res => res
        };

        let (bytes, status) = res.both();
        let bytes = bytes.unwrap_or(0);

        self.drive.account_transfer(bytes);

        let status = status.or(async_err);
        match status {
            Some(TransportStatus::EomOverflow) => {
                self.drive.active_mut().boundary = Boundary::EndOfMedium;
            },
            Some(TransportStatus::EndOfMedia) => {
                //Early warning only; the data landed.
                if bytes > 0 {
                    self.drive.pending = PendingWrite::HasWritten;
                }
            },
            None => {
                self.drive.active_mut().boundary = Boundary::None;
                self.drive.pending = PendingWrite::HasWritten;
            },
            Some(_) => {
                self.drive.active_mut().boundary = Boundary::None;
            }
        }

        match self.finish(status.map_or(Ok(()), Err)) {
            Ok(()) => Complete(bytes),
            Err(err) if bytes > 0 => Partial(bytes, err),
            Err(err) => Failure(err)
        }
    }

    /// Write `count` marks of the given kind.
    pub fn write_marks(&mut self, kind: MarkKind, count: u32) -> Result<(), TapeError> {
        let res = self.write_marks_raw(kind, count);
        self.finish(res)
    }

    pub(crate) fn write_marks_raw(&mut self, kind: MarkKind, count: u32) -> Status {
        if self.drive.pending == PendingWrite::AsyncWritePending {
            let _ = self.resolve_pending_write();
        }

        if !kind.is_setmark() {
            self.drive.pending = PendingWrite::Clean;
        }

        let kind = if kind == MarkKind::Filemarks && !self.drive.has_feature(DriveFeatures::WRITE_FILEMARKS) {
            if self.drive.has_feature(DriveFeatures::WRITE_LONG_FMKS) {
                MarkKind::LongFilemarks
            } else {
                MarkKind::ShortFilemarks
            }
        } else {
            kind
        };

        let res = self.call(|t| t.write_marks(kind, count, false));
        match res {
            Ok(()) => {
                self.drive.advance_block(count as i64);

                let part = self.drive.active_mut();
                part.block = offset(part.block, count as i64);
                part.advance_files(count as i64);
                part.fblock = Some(0);
                part.boundary = Boundary::Filemark;
                part.setmark = kind.is_setmark();
            },
            Err(_) => self.reconcile_position()
        }

        res
    }

    /// Erase from the current position. The active partition is considered
    /// rewound afterwards whatever happened.
    pub fn erase(&mut self, kind: EraseKind) -> Result<(), TapeError> {
        let res = self.erase_raw(kind);
        self.finish(res)
    }

    pub(crate) fn erase_raw(&mut self, kind: EraseKind) -> Status {
        let kind = match kind {
            EraseKind::Short if !self.drive.has_feature(DriveFeatures::ERASE_SHORT) => EraseKind::Long,
            EraseKind::Long if !self.drive.has_feature(DriveFeatures::ERASE_LONG) => EraseKind::Short,
            kind => kind
        };
        let immediate = self.drive.has_option(DriveOptions::NOWAIT);

        self.settle_pending_write();

        let res = self.call(|t| t.erase(kind, immediate));

        self.drive.block = None;
        self.drive.active_mut().initialize(Some(0));

        res
    }

    /// Load, unload, tension, lock, unlock or format the medium.
    ///
    /// `automatic` marks a lock taken on the caller's behalf, which close
    /// will release again.
    pub fn prepare(&mut self, action: PrepareAction, automatic: bool) -> Result<(), TapeError> {
        let res = self.prepare_raw(action, automatic);
        self.finish(res)
    }

    pub(crate) fn prepare_raw(&mut self, action: PrepareAction, automatic: bool) -> Status {
        self.settle_pending_write();

        let immediate = match action {
            PrepareAction::Load | PrepareAction::Unload | PrepareAction::Tension => self.drive.has_option(DriveOptions::NOWAIT),
            _ => false
        };

        let res = self.call(|t| t.prepare(action, immediate));

        match action {
            PrepareAction::Format | PrepareAction::Unload | PrepareAction::Load => self.reinitialize(),
            PrepareAction::Tension => self.drive.active_mut().initialize(Some(0)),
            PrepareAction::Lock => {
                self.drive.lock = match (res, automatic) {
                    (Err(_), _) => LockState::LockError,
                    (Ok(()), true) => LockState::AutoLocked,
                    (Ok(()), false) => LockState::Locked
                };
            },
            PrepareAction::Unlock => {
                self.drive.lock = if res.is_err() { LockState::LockError } else { LockState::Unlocked };
            }
        }

        res
    }

    /// Format the medium with one partition (`count <= 0`) or two, the
    /// second `count` units in size.
    pub fn create_partitions(&mut self, count: i64) -> Result<(), TapeError> {
        let res = self.create_partitions_raw(count);
        self.finish(res)
    }

    pub(crate) fn create_partitions_raw(&mut self, count: i64) -> Status {
        if self.drive.drive_params.maximum_partition_count <= 1 {
            return Err(TransportStatus::InvalidParameter);
        }

        self.set_pos(PositionMethod::Rewind, 0, false)?;

        self.drive.partition = 0;
        self.drive.reset_partition(0, Some(0));

        let (partitions, size) = if count <= 0 { (1, 0) } else { (2, count as u32) };
        debug!("tape{}: formatting with {} partition(s)", self.drive.unit, partitions);

        let method = if self.drive.has_feature(DriveFeatures::INITIATOR) {
            PartitionMethod::Initiator
        } else if self.drive.has_feature(DriveFeatures::FIXED) {
            //Some drives can format fixed partitions without admitting to
            //initiator-defined ones; they honor the size anyway.
            PartitionMethod::Fixed
        } else {
            return Err(TransportStatus::InvalidParameter);
        };

        self.call(|t| t.create_partition(method, partitions, size))?;

        self.reinitialize();
        self.drive.block = Some(0);
        self.drive.reset_partition(0, Some(0));

        Ok(())
    }

    /// Make `index` the active partition, returning to wherever we last left
    /// it.
    pub fn set_partition(&mut self, index: i64) -> Result<(), TapeError> {
        let res = self.set_partition_raw(index);
        self.finish(res)
    }

    pub(crate) fn set_partition_raw(&mut self, index: i64) -> Status {
        if index < 0 || index as usize >= MAX_PARTITIONS {
            return Err(TransportStatus::InvalidParameter);
        }

        if index as u64 >= self.drive.drive_params.maximum_partition_count as u64 {
            return Err(TransportStatus::IoDevice);
        }

        let index = index as u32;
        let target = self.drive.part(index).and_then(|p| p.block).unwrap_or(0);

        if let Err(err) = self.space(PositionMethod::LogicalBlock, target as i64, Some(index), false) {
            self.reconcile_position();
            return Err(err);
        }

        self.drive.partition = index;
        self.drive.block = Some(target);

        if self.drive.active().block.is_none() {
            self.drive.active_mut().initialize(Some(0));
        }

        Ok(())
    }

    /// Switch hardware compression on or off.
    pub fn set_compression(&mut self, enable: bool) -> Result<(), TapeError> {
        let res = self.set_compression_raw(enable);
        self.finish(res)
    }

    pub(crate) fn set_compression_raw(&mut self, enable: bool) -> Status {
        if !self.drive.has_feature(DriveFeatures::SET_COMPRESSION) {
            return Err(TransportStatus::InvalidParameter);
        }

        let mut settings = self.settings();
        settings.compression = enable;

        let res = self.call(|t| t.set_drive_parameters(&settings));
        match res {
            Ok(()) => self.drive.drive_params.compression = enable,
            Err(_) => { let _ = self.get_dp(); }
        }

        res
    }

    /// Change the medium's block size; zero selects variable-size blocks.
    pub fn set_blocksize(&mut self, size: u32) -> Result<(), TapeError> {
        let res = self.set_blocksize_raw(size);
        self.finish(res)
    }

    pub(crate) fn set_blocksize_raw(&mut self, size: u32) -> Status {
        let res = self.call(|t| t.set_media_parameters(size));
        match res {
            Ok(()) => self.drive.media_params.block_size = size,
            Err(_) => { let _ = self.get_mp(); }
        }

        res
    }

    /// Change driver options and the hardware-backed parameters that travel
    /// with them.
    ///
    /// Hardware parameters are only sent to the drive when their value
    /// actually changes.
    pub fn set_options(&mut self, request: OptionsRequest) -> Result<(), TapeError> {
        let res = self.set_options_raw(request);
        self.finish(res)
    }

    pub(crate) fn set_options_raw(&mut self, request: OptionsRequest) -> Status {
        let current = self.settings();
        let mut settings = current;

        match request {
            OptionsRequest::BufferWrites(enable) => {
                self.drive.set_option(DriveOptions::BUFFER_WRITES, enable);
            },
            OptionsRequest::Exact(options) => {
                self.drive.options = options & DriveOptions::driver();

                if self.drive.has_feature(DriveFeatures::SET_ECC) {
                    settings.ecc = options.contains(DriveOptions::ECC);
                }

                if self.drive.has_feature(DriveFeatures::SET_PADDING) {
                    settings.data_padding = options.contains(DriveOptions::PADDING);
                }

                if self.drive.has_feature(DriveFeatures::SET_REPORT_SMKS) {
                    settings.report_setmarks = options.contains(DriveOptions::REPORT_SETMARKS);
                }
            },
            OptionsRequest::Set(options) | OptionsRequest::Clear(options) => {
                let enable = match request {
                    OptionsRequest::Set(_) => true,
                    _ => false
                };

                self.drive.set_option(options, enable);

                if options.contains(DriveOptions::ECC) {
                    settings.ecc = enable;
                }

                if options.contains(DriveOptions::PADDING) {
                    settings.data_padding = enable;
                }

                if options.contains(DriveOptions::REPORT_SETMARKS) {
                    settings.report_setmarks = enable;
                }
            },
            OptionsRequest::EotWarningZone(size) => {
                if self.drive.has_feature(DriveFeatures::SET_EOT_WZ_SIZE) {
                    settings.eot_warning_zone_size = size;
                }
            }
        }

        if settings == current {
            return Ok(());
        }

        let res = self.call(|t| t.set_drive_parameters(&settings));
        match res {
            Ok(()) => {
                let dp = &mut self.drive.drive_params;

                dp.ecc = settings.ecc;
                dp.data_padding = settings.data_padding;
                dp.report_setmarks = settings.report_setmarks;
                dp.eot_warning_zone_size = settings.eot_warning_zone_size;
            },
            Err(_) => { let _ = self.get_dp(); }
        }

        res
    }
}
