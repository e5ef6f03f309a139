//! Process-wide configuration of tape units

use crate::tape::drive::DriveOptions;

#[derive(Copy, Clone)]
pub struct Configuration {
    pub unit_count: usize,
    pub default_options: DriveOptions,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            unit_count: 8, //Same unit limit as the classic mtio drivers
            default_options: DriveOptions::BUFFER_WRITES,
        }
    }
}
