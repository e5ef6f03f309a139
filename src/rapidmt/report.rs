use std::fmt::Display;
use pad::{PadStr, Alignment};
use librapidtape::tape::{TapeStatus, GeneralStatus};
use crate::rapidmt::units::DataSize;

/// Width of the label column in status reports.
const LABEL_WIDTH : usize = 20;

fn line(label: &str, value: impl Display) -> String {
    format!("{}{}\n", format!("{}:", label).pad(LABEL_WIDTH, ' ', Alignment::Left, false), value)
}

fn counter(value: Option<u64>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => "unknown".to_string()
    }
}

/// Names of the set status flags, separated by spaces.
pub fn flag_names(flags: GeneralStatus) -> String {
    flags.iter_names().map(|(name, _)| name).collect::<Vec<_>>().join(" ")
}

/// Render a status record the way `mt status` does, one field per line.
pub fn status_report(status: &TapeStatus) -> String {
    let mut report = String::new();

    let media = match status.density {
        Some(density) => format!("{:#x} (density {:#x})", status.media_type, density),
        None => format!("{:#x}", status.media_type)
    };

    let block_size = match status.block_size {
        0 => "variable".to_string(),
        size => DataSize::from(size).to_string()
    };

    report.push_str(&line("Media type", media));
    report.push_str(&line("Block size", block_size));
    report.push_str(&line("Partition", status.partition));
    report.push_str(&line("File number", counter(status.file)));
    report.push_str(&line("Block number", counter(status.fblock)));
    report.push_str(&line("Capacity", status.capacity));
    report.push_str(&line("Remaining", status.remaining));
    report.push_str(&line("Block size limits", format!("{} - {} (default {})", status.minimum_block_size, status.maximum_block_size, status.default_block_size)));
    report.push_str(&line("Features", format!("{:#018x}", status.features.bits())));
    report.push_str(&line("EOT warning zone", status.eot_warning_zone_size));
    report.push_str(&line("Flags", flag_names(status.flags)));

    report
}

#[cfg(test)]
mod tests {
    use super::{flag_names, status_report};
    use librapidtape::tape::{TapeStatus, GeneralStatus, DriveFeatures};

    fn status() -> TapeStatus {
        TapeStatus {
            media_type: 0x20,
            density: Some(0x26),
            block_size: 1024,
            partition: 0,
            file: Some(2),
            fblock: None,
            flags: GeneralStatus::ONLINE | GeneralStatus::EOF,
            capacity: 0,
            remaining: 0,
            minimum_block_size: 1,
            maximum_block_size: 65536,
            default_block_size: 512,
            features: DriveFeatures::VARIABLE_BLOCK,
            eot_warning_zone_size: 0
        }
    }

    #[test]
    fn flags_in_bit_order() {
        assert_eq!(flag_names(GeneralStatus::ONLINE | GeneralStatus::EOF), "EOF ONLINE");
        assert_eq!(flag_names(GeneralStatus::empty()), "");
    }

    #[test]
    fn report_lines() {
        let report = status_report(&status());
        let lines : Vec<&str> = report.lines().collect();

        assert_eq!(lines[0], "Media type:         0x20 (density 0x26)");
        assert_eq!(lines[1], "Block size:         1.00KB");
        assert_eq!(lines[3], "File number:        2");
        assert_eq!(lines[4], "Block number:       unknown");
        assert_eq!(lines.last(), Some(&"Flags:              EOF ONLINE"));
    }
}
