//! Composite status reporting.

use bitflags::bitflags;
use crate::tape::controller::DriveController;
use crate::tape::drive::{DriveOptions, DriveFeatures};
use crate::tape::transport::{TransportBackend, TransportStatus};

bitflags! {
    /// Generic status bits, laid out as the conventional mtio `mt_gstat`
    /// word.
    #[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
    pub struct GeneralStatus: u32 {
        const EOF = 0x8000_0000;
        const BOT = 0x4000_0000;
        const EOT = 0x2000_0000;
        const SM = 0x1000_0000;
        const EOD = 0x0800_0000;
        const WR_PROT = 0x0400_0000;
        const ONLINE = 0x0100_0000;
        const DR_OPEN = 0x0004_0000;
        const IM_REP_EN = 0x0001_0000;
        const CLN = 0x0000_8000;
        const REP_SM = 0x0000_1000;
        const PADDING = 0x0000_0800;
        const HW_ECC = 0x0000_0400;
        const HW_COMP = 0x0000_0200;
        const TWO_FM = 0x0000_0100;
        const FAST_MTEOM = 0x0000_0080;
        const AUTO_LOCK = 0x0000_0040;
        const SYSV = 0x0000_0020;
        const NOWAIT = 0x0000_0010;
        const ASYNC = 0x0000_0008;
    }
}

/// Everything `get_status` reports about a unit.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TapeStatus {
    /// Medium type as the transport numbers them; zero if unknown.
    pub media_type: u32,
    pub density: Option<u8>,
    /// Block size in effect, zero for variable-size blocks.
    pub block_size: u32,
    pub partition: u32,
    pub file: Option<u64>,
    pub fblock: Option<u64>,
    pub flags: GeneralStatus,
    pub capacity: u64,
    pub remaining: u64,
    pub minimum_block_size: u32,
    pub maximum_block_size: u32,
    pub default_block_size: u32,
    pub features: DriveFeatures,
    pub eot_warning_zone_size: u32
}

impl TapeStatus {
    pub fn has(&self, flag: GeneralStatus) -> bool {
        self.flags.contains(flag)
    }
}

impl<'a, T: TransportBackend + ?Sized> DriveController<'a, T> {
    /// Assemble the composite status record.
    ///
    /// Nothing here moves the medium or settles a boundary, so asking twice
    /// in a row gives the same answer.
    pub fn get_status(&mut self) -> TapeStatus {
        let device = self.call(|t| t.get_device_status());
        let no_medium = device == Err(TransportStatus::NoMedia);

        let mut media_type = 0;
        let mut density = None;

        if let Ok(types) = self.call(|t| t.media_types()) {
            for info in types {
                media_type = info.media_type;

                if info.mounted {
                    density = info.density;
                    break;
                }
            }
        }

        let drive = self.drive();
        let dp = &drive.drive_params;
        let mp = &drive.media_params;
        let part = drive.active();

        let block_size = if !no_medium && (drive.has_feature(DriveFeatures::SET_BLOCK_SIZE) || drive.has_feature(DriveFeatures::VARIABLE_BLOCK)) {
            mp.block_size
        } else {
            dp.default_block_size
        };

        let mut flags = GeneralStatus::empty();

        if !no_medium {
            flags |= GeneralStatus::ONLINE;

            if part.fblock == Some(0) {
                if part.file == Some(0) {
                    flags |= GeneralStatus::BOT;
                } else {
                    flags |= GeneralStatus::EOF;
                }
            }

            flags.set(GeneralStatus::EOD, part.boundary.end_of_data_seen());
            flags.set(GeneralStatus::EOT, part.boundary.end_of_medium_seen());
            flags.set(GeneralStatus::SM, part.setmark);
            flags.set(GeneralStatus::WR_PROT, mp.write_protected);
        } else {
            flags |= GeneralStatus::DR_OPEN;
        }

        flags.set(GeneralStatus::CLN, device == Err(TransportStatus::DeviceRequiresCleaning));
        flags.set(GeneralStatus::IM_REP_EN, drive.has_option(DriveOptions::BUFFER_WRITES));
        flags.set(GeneralStatus::REP_SM, dp.report_setmarks);
        flags.set(GeneralStatus::PADDING, dp.data_padding);
        flags.set(GeneralStatus::HW_ECC, dp.ecc);
        flags.set(GeneralStatus::HW_COMP, dp.compression);
        flags.set(GeneralStatus::TWO_FM, drive.has_option(DriveOptions::TWO_FM));
        flags.set(GeneralStatus::FAST_MTEOM, drive.has_option(DriveOptions::FAST_EOM));
        flags.set(GeneralStatus::AUTO_LOCK, drive.has_option(DriveOptions::AUTO_LOCK));
        flags.set(GeneralStatus::SYSV, drive.has_option(DriveOptions::SYSV));
        flags.set(GeneralStatus::NOWAIT, drive.has_option(DriveOptions::NOWAIT));
        flags.set(GeneralStatus::ASYNC, drive.has_option(DriveOptions::ASYNC_WRITES));

        TapeStatus {
            media_type: media_type,
            density: density,
            block_size: block_size,
            partition: drive.partition,
            file: part.file,
            fblock: part.fblock,
            flags: flags,
            capacity: if no_medium { 0 } else { mp.capacity },
            remaining: if no_medium { 0 } else { mp.remaining },
            minimum_block_size: dp.minimum_block_size,
            maximum_block_size: dp.maximum_block_size,
            default_block_size: dp.default_block_size,
            features: dp.features,
            eot_warning_zone_size: dp.eot_warning_zone_size
        }
    }
}
