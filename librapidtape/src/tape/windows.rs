//! Tape transport over the NT tape API.

use std::{io, ptr, ffi, mem};
use std::os::windows::ffi::OsStrExt;
use winapi::um::{winbase, fileapi, handleapi};
use winapi::shared::ntdef::{BOOLEAN, TRUE, FALSE};
use winapi::shared::minwindef::{BOOL, LPVOID, LPCVOID, DWORD};
use winapi::shared::winerror;
use winapi::um::winnt::{self, WCHAR, HANDLE, GENERIC_READ, GENERIC_WRITE};
use winapi::um::fileapi::OPEN_EXISTING;
use winapi::um::handleapi::INVALID_HANDLE_VALUE;
use crate::result::PartialResult::{Complete, Partial, Failure};
use crate::tape::drive::{DriveParameters, MediaParameters, DriveFeatures};
use crate::tape::transport::{TransportBackend, TransportStatus, Status, Transfer, PositionQuery, TapePosition, PositionMethod, MarkKind, EraseKind, PrepareAction, PartitionMethod, DriveSettings};

/// Marks feature words that belong in the high half.
const TAPE_DRIVE_HIGH_FEATURES : DWORD = 0x8000_0000;

pub struct WindowsTransport {
    tape_device: HANDLE
}

/// Absolutely not safe in the general case, but Windows handles are definitely
/// Sendable. This is an oversight of the winapi developers, probably.
unsafe impl Send for WindowsTransport {

}

impl WindowsTransport {
    /// Open a tape device by it's NT device path.
    pub fn open_device(nt_device_path : &ffi::OsStr) -> io::Result<WindowsTransport> {
        let mut nt_device_path_ffi : Vec<WCHAR> = nt_device_path.encode_wide().collect();
        nt_device_path_ffi.push(0 as WCHAR);

        let nt_device_ptr = nt_device_path_ffi.as_ptr();

        let nt_device = unsafe { fileapi::CreateFileW(nt_device_ptr, GENERIC_READ | GENERIC_WRITE, 0, ptr::null_mut(), OPEN_EXISTING, 0, ptr::null_mut()) };

        if nt_device == INVALID_HANDLE_VALUE {
            return Err(io::Error::last_os_error());
        }

        unsafe {
            Ok(WindowsTransport::from_device_handle(nt_device))
        }
    }

    /// Construct a transport directly from an NT handle.
    ///
    /// This is an unsafe function. The nt_device handle must be a valid NT
    /// kernel handle that points to an open tape device, and the transport
    /// takes ownership of it.
    pub unsafe fn from_device_handle(nt_device : HANDLE) -> WindowsTransport {
        WindowsTransport {
            tape_device: nt_device
        }
    }

    fn transfer(&self, ok: BOOL, count: DWORD) -> Transfer {
        if ok == TRUE as BOOL {
            return Complete(count as usize);
        }

        let status = last_status();
        if count > 0 {
            Partial(count as usize, status)
        } else {
            Failure(status)
        }
    }
}

impl Drop for WindowsTransport {
    fn drop(&mut self) {
        unsafe { handleapi::CloseHandle(self.tape_device) };
    }
}

/// Translate an NT error code into a transport status.
fn status_of(code: DWORD) -> TransportStatus {
    match code {
        winerror::ERROR_MEDIA_CHANGED => TransportStatus::MediaChanged,
        winerror::ERROR_BUS_RESET => TransportStatus::BusReset,
        winerror::ERROR_FILEMARK_DETECTED => TransportStatus::FilemarkDetected,
        winerror::ERROR_SETMARK_DETECTED => TransportStatus::SetmarkDetected,
        winerror::ERROR_NO_DATA_DETECTED => TransportStatus::NoDataDetected,
        winerror::ERROR_END_OF_MEDIA => TransportStatus::EndOfMedia,
        winerror::ERROR_EOM_OVERFLOW => TransportStatus::EomOverflow,
        winerror::ERROR_BEGINNING_OF_MEDIA => TransportStatus::BeginningOfMedia,
        winerror::ERROR_MORE_DATA => TransportStatus::MoreData,
        winerror::ERROR_NO_MEDIA_IN_DRIVE => TransportStatus::NoMedia,
        winerror::ERROR_INVALID_PARAMETER => TransportStatus::InvalidParameter,
        winerror::ERROR_INVALID_FUNCTION => TransportStatus::InvalidFunction,
        winerror::ERROR_IO_DEVICE => TransportStatus::IoDevice,
        winerror::ERROR_NOT_READY => TransportStatus::NotReady,
        winerror::ERROR_IO_PENDING => TransportStatus::IoPending,
        winerror::ERROR_DEVICE_REQUIRES_CLEANING => TransportStatus::DeviceRequiresCleaning,
        winerror::ERROR_INVALID_BLOCK_LENGTH => TransportStatus::InvalidBlockLength,
        winerror::ERROR_NOT_ENOUGH_MEMORY => TransportStatus::NotEnoughMemory,
        winerror::ERROR_WRITE_PROTECT => TransportStatus::WriteProtect,
        other => TransportStatus::Other(other)
    }
}

fn status(code: DWORD) -> Status {
    if code == winerror::NO_ERROR {
        Ok(())
    } else {
        Err(status_of(code))
    }
}

fn last_status() -> TransportStatus {
    status_of(io::Error::last_os_error().raw_os_error().unwrap_or(0) as DWORD)
}

fn boolean(value: bool) -> BOOLEAN {
    if value { TRUE } else { FALSE }
}

impl TransportBackend for WindowsTransport {
    fn get_position(&mut self, query: PositionQuery) -> Result<TapePosition, TransportStatus> {
        let mut part = 0;
        let mut lo = 0;
        let mut hi = 0;

        let position_type = match query {
            PositionQuery::Logical => winnt::TAPE_LOGICAL_POSITION,
            PositionQuery::Absolute => winnt::TAPE_ABSOLUTE_POSITION
        };

        status(unsafe { winbase::GetTapePosition(self.tape_device, position_type, &mut part, &mut lo, &mut hi) })?;

        //NT numbers partitions from 1, and reports 0 for "no partitions".
        Ok(TapePosition {
            partition: if part > 0 { Some(part - 1) } else { None },
            block: (hi as u64) << 32 | lo as u64
        })
    }

    fn set_position(&mut self, method: PositionMethod, partition: Option<u32>, count: i64, immediate: bool) -> Status {
        let method = match method {
            PositionMethod::Rewind => winnt::TAPE_REWIND,
            PositionMethod::AbsoluteBlock => winnt::TAPE_ABSOLUTE_BLOCK,
            PositionMethod::LogicalBlock => winnt::TAPE_LOGICAL_BLOCK,
            PositionMethod::EndOfData => winnt::TAPE_SPACE_END_OF_DATA,
            PositionMethod::RelativeBlocks => winnt::TAPE_SPACE_RELATIVE_BLOCKS,
            PositionMethod::Filemarks => winnt::TAPE_SPACE_FILEMARKS,
            PositionMethod::Setmarks => winnt::TAPE_SPACE_SETMARKS
        };
        let partition = partition.map(|p| p + 1).unwrap_or(0);

        status(unsafe { winbase::SetTapePosition(self.tape_device, method, partition as DWORD, (count & 0xFFFFFFFF) as DWORD, (count >> 32) as DWORD, immediate as BOOL) })
    }

    fn read(&mut self, buf: &mut [u8]) -> Transfer {
        let mut read_count : DWORD = 0;
        let ok = unsafe { fileapi::ReadFile(self.tape_device, buf.as_mut_ptr() as LPVOID, buf.len() as DWORD, &mut read_count, ptr::null_mut()) };

        self.transfer(ok, read_count)
    }

    fn write(&mut self, buf: &[u8]) -> Transfer {
        let mut write_count : DWORD = 0;
        let ok = unsafe { fileapi::WriteFile(self.tape_device, buf.as_ptr() as LPCVOID, buf.len() as DWORD, &mut write_count, ptr::null_mut()) };

        self.transfer(ok, write_count)
    }

    /// The handle is opened for synchronous I/O, so nothing is ever
    /// outstanding.
    fn wait_async(&mut self) -> Transfer {
        Complete(0)
    }

    fn write_marks(&mut self, kind: MarkKind, count: u32, immediate: bool) -> Status {
        let kind = match kind {
            MarkKind::Setmarks => winnt::TAPE_SETMARKS,
            MarkKind::Filemarks => winnt::TAPE_FILEMARKS,
            MarkKind::ShortFilemarks => winnt::TAPE_SHORT_FILEMARKS,
            MarkKind::LongFilemarks => winnt::TAPE_LONG_FILEMARKS
        };

        status(unsafe { winbase::WriteTapemark(self.tape_device, kind, count, immediate as BOOL) })
    }

    fn erase(&mut self, kind: EraseKind, immediate: bool) -> Status {
        let kind = match kind {
            EraseKind::Short => winnt::TAPE_ERASE_SHORT,
            EraseKind::Long => winnt::TAPE_ERASE_LONG
        };

        status(unsafe { winbase::EraseTape(self.tape_device, kind, immediate as BOOL) })
    }

    fn create_partition(&mut self, method: PartitionMethod, count: u32, size: u32) -> Status {
        let method = match method {
            PartitionMethod::Fixed => winnt::TAPE_FIXED_PARTITIONS,
            PartitionMethod::Select => winnt::TAPE_SELECT_PARTITIONS,
            PartitionMethod::Initiator => winnt::TAPE_INITIATOR_PARTITIONS
        };

        status(unsafe { winbase::CreateTapePartition(self.tape_device, method, count, size) })
    }

    fn prepare(&mut self, action: PrepareAction, immediate: bool) -> Status {
        let action = match action {
            PrepareAction::Load => winnt::TAPE_LOAD,
            PrepareAction::Unload => winnt::TAPE_UNLOAD,
            PrepareAction::Tension => winnt::TAPE_TENSION,
            PrepareAction::Lock => winnt::TAPE_LOCK,
            PrepareAction::Unlock => winnt::TAPE_UNLOCK,
            PrepareAction::Format => winnt::TAPE_FORMAT
        };

        status(unsafe { winbase::PrepareTape(self.tape_device, action, immediate as BOOL) })
    }

    fn get_drive_parameters(&mut self) -> Result<DriveParameters, TransportStatus> {
        let mut info : winnt::TAPE_GET_DRIVE_PARAMETERS = unsafe { mem::zeroed() };
        let mut size = mem::size_of::<winnt::TAPE_GET_DRIVE_PARAMETERS>() as DWORD;

        status(unsafe { winbase::GetTapeParameters(self.tape_device, winnt::GET_TAPE_DRIVE_INFORMATION, &mut size, &mut info as *mut _ as LPVOID) })?;

        let features = info.FeaturesLow as u64 | ((info.FeaturesHigh & !TAPE_DRIVE_HIGH_FEATURES) as u64) << 32;

        Ok(DriveParameters {
            ecc: info.ECC != 0,
            compression: info.Compression != 0,
            data_padding: info.DataPadding != 0,
            report_setmarks: info.ReportSetmarks != 0,
            default_block_size: info.DefaultBlockSize,
            maximum_block_size: info.MaximumBlockSize,
            minimum_block_size: info.MinimumBlockSize,
            maximum_partition_count: info.MaximumPartitionCount,
            features: DriveFeatures::from_bits_truncate(features),
            eot_warning_zone_size: info.EOTWarningZoneSize
        })
    }

    fn get_media_parameters(&mut self) -> Result<MediaParameters, TransportStatus> {
        let mut info : winnt::TAPE_GET_MEDIA_PARAMETERS = unsafe { mem::zeroed() };
        let mut size = mem::size_of::<winnt::TAPE_GET_MEDIA_PARAMETERS>() as DWORD;

        status(unsafe { winbase::GetTapeParameters(self.tape_device, winnt::GET_TAPE_MEDIA_INFORMATION, &mut size, &mut info as *mut _ as LPVOID) })?;

        Ok(MediaParameters {
            capacity: unsafe { *info.Capacity.QuadPart() } as u64,
            remaining: unsafe { *info.Remaining.QuadPart() } as u64,
            block_size: info.BlockSize,
            partition_count: info.PartitionCount,
            write_protected: info.WriteProtected != 0
        })
    }

    fn set_drive_parameters(&mut self, settings: &DriveSettings) -> Status {
        let mut info = winnt::TAPE_SET_DRIVE_PARAMETERS {
            ECC: boolean(settings.ecc),
            Compression: boolean(settings.compression),
            DataPadding: boolean(settings.data_padding),
            ReportSetmarks: boolean(settings.report_setmarks),
            EOTWarningZoneSize: settings.eot_warning_zone_size
        };

        status(unsafe { winbase::SetTapeParameters(self.tape_device, winnt::SET_TAPE_DRIVE_INFORMATION, &mut info as *mut _ as LPVOID) })
    }

    fn set_media_parameters(&mut self, block_size: u32) -> Status {
        let mut info = winnt::TAPE_SET_MEDIA_PARAMETERS { BlockSize: block_size };

        status(unsafe { winbase::SetTapeParameters(self.tape_device, winnt::SET_TAPE_MEDIA_INFORMATION, &mut info as *mut _ as LPVOID) })
    }

    fn get_device_status(&mut self) -> Status {
        status(unsafe { winbase::GetTapeStatus(self.tape_device) })
    }
}
