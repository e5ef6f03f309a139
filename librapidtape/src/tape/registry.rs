//! Process-wide table of tape units.

use std::sync::{Arc, Mutex};
use lazy_static::lazy_static;
use crate::error::TapeError;
use crate::tape::drive::DriveState;
use crate::tuning::Configuration;

lazy_static! {
    static ref GLOBAL_REGISTRY: DriveRegistry = DriveRegistry::new(&Configuration::default());
}

/// One `DriveState` per unit, shared by every handle opened on that unit.
///
/// Each unit sits behind its own mutex; a handle holds it for exactly one
/// operation, so handles on different units never contend.
pub struct DriveRegistry {
    drives: Vec<Arc<Mutex<DriveState>>>
}

impl DriveRegistry {
    pub fn new(config: &Configuration) -> DriveRegistry {
        DriveRegistry {
            drives: (0..config.unit_count).map(|unit| Arc::new(Mutex::new(DriveState::new(unit, config.default_options)))).collect()
        }
    }

    /// The registry shared by the whole process, created on first use.
    pub fn global() -> &'static DriveRegistry {
        &GLOBAL_REGISTRY
    }

    pub fn unit_count(&self) -> usize {
        self.drives.len()
    }

    pub fn drive(&self, unit: usize) -> Result<Arc<Mutex<DriveState>>, TapeError> {
        self.drives.get(unit).cloned().ok_or(TapeError::NoSuchUnit)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use super::DriveRegistry;
    use crate::error::TapeError;
    use crate::tape::drive::DriveOptions;
    use crate::tuning::Configuration;

    #[test]
    fn units_are_shared() {
        let registry = DriveRegistry::new(&Configuration::default());
        let first = registry.drive(3).unwrap();
        let second = registry.drive(3).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.lock().unwrap().unit, 3);
    }

    #[test]
    fn unknown_unit() {
        let registry = DriveRegistry::new(&Configuration::default());

        assert_eq!(registry.unit_count(), 8);
        assert_eq!(registry.drive(8).err(), Some(TapeError::NoSuchUnit));
    }

    #[test]
    fn default_options_apply() {
        let config = Configuration { unit_count: 1, default_options: DriveOptions::TWO_FM | DriveOptions::ECC };
        let registry = DriveRegistry::new(&config);
        let drive = registry.drive(0).unwrap();
        let drive = drive.lock().unwrap();

        assert!(drive.has_option(DriveOptions::TWO_FM));
        assert!(!drive.has_option(DriveOptions::ECC));
    }
}
