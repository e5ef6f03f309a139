use std::io;
use thiserror::Error;
use librapidtape::tape::{TapeOp, OptionsRequest};

/// What the command line asked `rapidmt` to do.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Operation {
    /// Control commands, issued in order.
    Control(Vec<TapeOp>),
    Tell,
    Status,
    /// Copy the current tape file out to a file or stdout.
    Read,
    /// Copy a file or stdin onto the tape.
    Write
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("command {0} not recognized")]
    Unknown(String),
    #[error("{count} is not a valid count for {name}")]
    BadCount { name: String, count: i64 }
}

impl From<CommandError> for io::Error {
    fn from(err: CommandError) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidInput, err)
    }
}

/// Interpret an operation name and its count argument.
///
/// Names follow the conventional `mt` vocabulary; `count` means "how many"
/// for spacing and marks, and is the parameter for everything that takes
/// one (block number, partition index, block size, options word).
pub fn parse_operation(name: &str, count: i64) -> Result<Operation, CommandError> {
    let bad_count = || CommandError::BadCount { name: name.to_string(), count: count };
    let unsigned = || if count < 0 { Err(bad_count()) } else { Ok(count as u64) };
    let small = || if count < 0 || count > u32::max_value() as i64 { Err(bad_count()) } else { Ok(count as u32) };

    let op = match name {
        "tell" => return Ok(Operation::Tell),
        "status" => return Ok(Operation::Status),
        "read" => return Ok(Operation::Read),
        "write" => return Ok(Operation::Write),
        "asf" => return Ok(Operation::Control(vec![TapeOp::Rewind, TapeOp::Fsf(unsigned()? as i64)])),
        "fsf" => TapeOp::Fsf(count),
        "fsfm" => TapeOp::Fsfm(count),
        "bsf" => TapeOp::Bsf(count),
        "bsfm" => TapeOp::Bsfm(count),
        "rewind" => TapeOp::Rewind,
        "eod" | "eom" => TapeOp::Eom,
        "fsr" => TapeOp::Fsr(count),
        "bsr" => TapeOp::Bsr(count),
        "asr" | "seek" => TapeOp::Seek(unsigned()?),
        "fss" => TapeOp::Fss(count),
        "bss" => TapeOp::Bss(count),
        "weof" | "eof" => TapeOp::Weof(small()?),
        "wsm" => TapeOp::Wsm(small()?),
        "setpartition" => TapeOp::SetPartition(count),
        "mkpart" => TapeOp::MakePartition(count),
        "erase" => TapeOp::Erase,
        "retension" => TapeOp::Retension,
        "load" => TapeOp::Load,
        "unload" | "offline" => TapeOp::Offline,
        "lock" => TapeOp::Lock,
        "unlock" => TapeOp::Unlock,
        "setblk" => TapeOp::SetBlock(small()?),
        "compression" => TapeOp::Compression(count != 0),
        "drvbuffer" => TapeOp::SetDriveBuffer(OptionsRequest::from_raw(small()?).ok_or_else(bad_count)?),
        "nop" => TapeOp::Nop,
        "reset" => TapeOp::Reset,
        _ => return Err(CommandError::Unknown(name.to_string()))
    };

    Ok(Operation::Control(vec![op]))
}

#[cfg(test)]
mod tests {
    use super::{parse_operation, Operation, CommandError};
    use librapidtape::tape::{TapeOp, OptionsRequest, DriveOptions};

    fn control(name: &str, count: i64) -> Vec<TapeOp> {
        match parse_operation(name, count) {
            Ok(Operation::Control(ops)) => ops,
            other => panic!("{} parsed as {:?}", name, other)
        }
    }

    #[test]
    fn spacing() {
        assert_eq!(control("fsf", 2), vec![TapeOp::Fsf(2)]);
        assert_eq!(control("bsfm", 1), vec![TapeOp::Bsfm(1)]);
        assert_eq!(control("asf", 3), vec![TapeOp::Rewind, TapeOp::Fsf(3)]);
        assert_eq!(control("eod", 1), vec![TapeOp::Eom]);
        assert_eq!(control("seek", 100), vec![TapeOp::Seek(100)]);
    }

    #[test]
    fn parameters() {
        assert_eq!(control("setblk", 0), vec![TapeOp::SetBlock(0)]);
        assert_eq!(control("compression", 0), vec![TapeOp::Compression(false)]);
        assert_eq!(control("setpartition", 1), vec![TapeOp::SetPartition(1)]);
        assert_eq!(control("drvbuffer", 0x3000_0010), vec![TapeOp::SetDriveBuffer(OptionsRequest::Set(DriveOptions::TWO_FM))]);
    }

    #[test]
    fn non_control() {
        assert_eq!(parse_operation("tell", 1), Ok(Operation::Tell));
        assert_eq!(parse_operation("status", 1), Ok(Operation::Status));
        assert_eq!(parse_operation("read", 1), Ok(Operation::Read));
    }

    #[test]
    fn bad_input() {
        assert_eq!(parse_operation("frobnicate", 1), Err(CommandError::Unknown("frobnicate".to_string())));
        assert_eq!(parse_operation("weof", -1), Err(CommandError::BadCount { name: "weof".to_string(), count: -1 }));
        assert_eq!(parse_operation("seek", -5), Err(CommandError::BadCount { name: "seek".to_string(), count: -5 }));
        assert_eq!(parse_operation("drvbuffer", 7), Err(CommandError::BadCount { name: "drvbuffer".to_string(), count: 7 }));
    }
}
