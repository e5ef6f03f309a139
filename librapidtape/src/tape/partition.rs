//! Per-partition position record.

/// Which structural boundary, if any, the last operation ran into.
///
/// The ordering is load-bearing: status reporting treats anything at or past
/// `EndOfDataHit` as "end of data seen" and anything at or past
/// `EndOfMediumHit` as "end of medium seen".
///
/// The `*Hit` states are one-shot. The next read consumes them, reports a
/// zero-length read, and leaves the steady-state counterpart behind.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub enum Boundary {
    None,
    FilemarkHit,
    Filemark,
    EndOfDataHit,
    EndOfData,
    EndOfMediumHit,
    EndOfMedium
}

impl Boundary {
    pub fn is_hit(self) -> bool {
        match self {
            Boundary::FilemarkHit | Boundary::EndOfDataHit | Boundary::EndOfMediumHit => true,
            _ => false
        }
    }

    /// The steady-state counterpart of a `*Hit` state. Other states are
    /// returned unchanged.
    pub fn settle(self) -> Boundary {
        match self {
            Boundary::FilemarkHit => Boundary::Filemark,
            Boundary::EndOfDataHit => Boundary::EndOfData,
            Boundary::EndOfMediumHit => Boundary::EndOfMedium,
            other => other
        }
    }

    pub fn end_of_data_seen(self) -> bool {
        self >= Boundary::EndOfDataHit
    }

    pub fn end_of_medium_seen(self) -> bool {
        self >= Boundary::EndOfMediumHit
    }
}

impl Default for Boundary {
    fn default() -> Self {
        Boundary::None
    }
}

/// Where we believe we are within one partition.
///
/// Every counter may independently be unknown (`None`). Code that cannot
/// predict a counter exactly after talking to the transport must either
/// leave it unknown or go ask the transport.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct PartitionState {
    /// Block number within the partition.
    pub block: Option<u64>,
    /// Index of the current file, counted in filemarks from the start.
    pub file: Option<u64>,
    /// Block offset within the current file.
    pub fblock: Option<u64>,
    /// Set only right after crossing or writing a setmark.
    pub setmark: bool,
    pub boundary: Boundary
}

impl PartitionState {
    /// A partition we know nothing about.
    pub fn unset() -> PartitionState {
        PartitionState::default()
    }

    /// A partition positioned at `block`.
    ///
    /// Only block 0 tells us the file and in-file offset; any other block
    /// leaves both unknown.
    pub fn at(block: Option<u64>) -> PartitionState {
        let mut part = PartitionState::unset();

        part.initialize(block);
        part
    }

    /// Forget everything and re-establish the partition at `block`.
    pub fn initialize(&mut self, block: Option<u64>) {
        self.block = block;

        if block == Some(0) {
            self.file = Some(0);
            self.fblock = Some(0);
        } else {
            self.file = None;
            self.fblock = None;
        }

        self.setmark = false;
        self.boundary = Boundary::None;
    }

    /// Account for `count` blocks moved within the current file.
    pub fn advance_blocks(&mut self, count: i64) {
        self.block = offset(self.block, count);
        self.fblock = offset(self.fblock, count);
    }

    /// Account for `count` files crossed. An unknown file index stays
    /// unknown.
    pub fn advance_files(&mut self, count: i64) {
        self.file = offset(self.file, count);
    }
}

/// Apply a signed delta to a possibly-unknown counter.
///
/// Running off the front of the counter means we were wrong about where we
/// were, so the result is unknown rather than clamped.
pub fn offset(value: Option<u64>, delta: i64) -> Option<u64> {
    let value = value?;

    if delta >= 0 {
        value.checked_add(delta as u64)
    } else {
        value.checked_sub(delta.unsigned_abs())
    }
}

#[cfg(test)]
mod tests {
    use super::{Boundary, PartitionState, offset};

    #[test]
    fn boundary_ordering() {
        assert!(Boundary::None < Boundary::FilemarkHit);
        assert!(Boundary::FilemarkHit < Boundary::Filemark);
        assert!(Boundary::Filemark < Boundary::EndOfDataHit);
        assert!(Boundary::EndOfData < Boundary::EndOfMediumHit);
        assert!(Boundary::EndOfMediumHit < Boundary::EndOfMedium);

        assert!(!Boundary::Filemark.end_of_data_seen());
        assert!(Boundary::EndOfDataHit.end_of_data_seen());
        assert!(Boundary::EndOfMediumHit.end_of_data_seen());
        assert!(!Boundary::EndOfData.end_of_medium_seen());
        assert!(Boundary::EndOfMediumHit.end_of_medium_seen());
    }

    #[test]
    fn boundary_settle() {
        assert_eq!(Boundary::FilemarkHit.settle(), Boundary::Filemark);
        assert_eq!(Boundary::EndOfDataHit.settle(), Boundary::EndOfData);
        assert_eq!(Boundary::EndOfMediumHit.settle(), Boundary::EndOfMedium);
        assert_eq!(Boundary::Filemark.settle(), Boundary::Filemark);
        assert_eq!(Boundary::None.settle(), Boundary::None);
    }

    #[test]
    fn partition_initialize_at_zero() {
        let part = PartitionState::at(Some(0));

        assert_eq!(part.block, Some(0));
        assert_eq!(part.file, Some(0));
        assert_eq!(part.fblock, Some(0));
        assert_eq!(part.boundary, Boundary::None);
    }

    #[test]
    fn partition_initialize_elsewhere() {
        let mut part = PartitionState::at(Some(0));

        part.setmark = true;
        part.boundary = Boundary::EndOfData;
        part.initialize(Some(42));

        assert_eq!(part.block, Some(42));
        assert_eq!(part.file, None);
        assert_eq!(part.fblock, None);
        assert!(!part.setmark);
        assert_eq!(part.boundary, Boundary::None);
    }

    #[test]
    fn offset_underflow_is_unknown() {
        assert_eq!(offset(Some(3), -2), Some(1));
        assert_eq!(offset(Some(3), -4), None);
        assert_eq!(offset(None, 5), None);
        assert_eq!(offset(Some(u64::max_value()), 1), None);
    }
}
