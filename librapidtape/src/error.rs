use std::io;
use thiserror::Error;
use crate::tape::transport::TransportStatus;

/// An error surfaced by a tape operation.
///
/// Boundary conditions only show up here once they have settled: the first
/// encounter with a filemark or the end of data is reported as a short read,
/// not as an error.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapeError {
    #[error("no medium in drive")]
    NoMedium,
    #[error("invalid parameter")]
    InvalidParameter,
    #[error("I/O error on tape device")]
    IoDevice,
    #[error("tape device is not ready")]
    NotReady,
    #[error("bus reset; rewind, unload, retension, erase, seek or skip to end of data to recover")]
    BusReset,
    #[error("end of recorded data")]
    EndOfData,
    #[error("end of medium")]
    EndOfMedium,
    #[error("beginning of medium")]
    BeginningOfMedium,
    #[error("buffer too small for tape block")]
    OutOfMemory,
    #[error("invalid block length")]
    InvalidBlockLength,
    #[error("medium is write protected")]
    WriteProtected,
    #[error("drive requires cleaning")]
    NeedsCleaning,
    #[error("no such tape unit")]
    NoSuchUnit,
    #[error("tape unit is closed")]
    Closed,
    #[error("operation not supported by this tape device")]
    Unsupported,
    #[error("tape transport reported: {0}")]
    Transport(TransportStatus)
}

impl From<TransportStatus> for TapeError {
    fn from(status: TransportStatus) -> TapeError {
        match status {
            TransportStatus::NoMedia => TapeError::NoMedium,
            TransportStatus::InvalidParameter => TapeError::InvalidParameter,
            TransportStatus::IoDevice => TapeError::IoDevice,
            TransportStatus::NotReady => TapeError::NotReady,
            TransportStatus::BusReset => TapeError::BusReset,
            TransportStatus::NoDataDetected => TapeError::EndOfData,
            TransportStatus::EndOfMedia | TransportStatus::EomOverflow => TapeError::EndOfMedium,
            TransportStatus::BeginningOfMedia => TapeError::BeginningOfMedium,
            TransportStatus::NotEnoughMemory | TransportStatus::MoreData => TapeError::OutOfMemory,
            TransportStatus::InvalidBlockLength => TapeError::InvalidBlockLength,
            TransportStatus::WriteProtect => TapeError::WriteProtected,
            TransportStatus::DeviceRequiresCleaning => TapeError::NeedsCleaning,
            TransportStatus::InvalidFunction => TapeError::Unsupported,
            other => TapeError::Transport(other)
        }
    }
}

impl TapeError {
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            TapeError::NoMedium | TapeError::NoSuchUnit => io::ErrorKind::NotFound,
            TapeError::InvalidParameter | TapeError::InvalidBlockLength => io::ErrorKind::InvalidInput,
            TapeError::OutOfMemory => io::ErrorKind::Other,
            TapeError::WriteProtected => io::ErrorKind::PermissionDenied,
            TapeError::EndOfData | TapeError::EndOfMedium | TapeError::BeginningOfMedium => io::ErrorKind::UnexpectedEof,
            TapeError::NotReady => io::ErrorKind::WouldBlock,
            TapeError::BusReset => io::ErrorKind::ConnectionReset,
            TapeError::Closed => io::ErrorKind::NotConnected,
            _ => io::ErrorKind::Other
        }
    }
}

impl From<TapeError> for io::Error {
    fn from(err: TapeError) -> io::Error {
        io::Error::new(err.kind(), err)
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use super::TapeError;
    use crate::tape::transport::TransportStatus;

    #[test]
    fn buffer_too_small_is_out_of_memory() {
        assert_eq!(TapeError::from(TransportStatus::MoreData), TapeError::OutOfMemory);
        assert_eq!(TapeError::from(TransportStatus::NotEnoughMemory), TapeError::OutOfMemory);
    }

    #[test]
    fn unknown_status_passes_through() {
        assert_eq!(TapeError::from(TransportStatus::Other(1117)), TapeError::Transport(TransportStatus::Other(1117)));
    }

    #[test]
    fn io_conversion_keeps_kind() {
        let err : io::Error = TapeError::NoMedium.into();

        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert_eq!(format!("{}", err), "no medium in drive");
    }
}
